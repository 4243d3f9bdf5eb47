//! Web 路由处理函数
//!
//! 每次请求都从状态表取一份快照再渲染，渲染期间不持有锁

use super::{status_rows, StatusCounts, StatusRow, WebAppState};
use crate::status::UrlStatus;
use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json},
};
use tracing::error;

/// 状态页模板
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    rows: Vec<StatusRow>,
    counts: StatusCounts,
    last_updated: String,
    version: &'static str,
}

/// API 状态响应结构
#[derive(serde::Serialize)]
struct ApiStatusResponse {
    last_updated: String,
    uptime_seconds: i64,
    counts: StatusCounts,
    statuses: Vec<UrlStatus>,
}

/// 状态页处理函数
pub async fn index(State(app_state): State<WebAppState>) -> impl IntoResponse {
    let snapshot = app_state.table.snapshot().await;

    let template = IndexTemplate {
        rows: status_rows(&snapshot),
        counts: StatusCounts::from(&snapshot),
        last_updated: snapshot
            .taken_at
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        version: crate::VERSION,
    };

    match template.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("模板渲染失败: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "模板渲染失败").into_response()
        }
    }
}

/// API 状态端点处理函数
pub async fn api_status(State(app_state): State<WebAppState>) -> impl IntoResponse {
    let snapshot = app_state.table.snapshot().await;

    let response = ApiStatusResponse {
        last_updated: snapshot.taken_at.to_rfc3339(),
        uptime_seconds: (snapshot.taken_at - app_state.start_time).num_seconds(),
        counts: StatusCounts::from(&snapshot),
        statuses: snapshot.sorted().into_iter().cloned().collect(),
    };

    Json(response)
}
