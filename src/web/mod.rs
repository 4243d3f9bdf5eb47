//! Web界面模块
//!
//! 提供状态页面和JSON状态接口

use crate::status::{StatusSnapshot, StatusTable, UrlStatus};
use crate::health::HealthStatus;
use chrono::{DateTime, Local, Utc};

pub mod handlers;
pub mod server;

pub use server::WebServer;

/// Web 处理函数共享的状态
#[derive(Debug, Clone)]
pub struct WebAppState {
    /// URL状态表
    pub table: StatusTable,
    /// 启动时间
    pub start_time: DateTime<Utc>,
}

impl WebAppState {
    /// 创建新的Web状态
    pub fn new(table: StatusTable) -> Self {
        Self {
            table,
            start_time: Utc::now(),
        }
    }
}

/// 页面上一行的展示数据
#[derive(Debug, Clone)]
pub struct StatusRow {
    pub url: String,
    pub state: String,
    pub icon: String,
    pub css_class: String,
    pub status_code: String,
    pub checked_at: String,
    pub latency_ms: u64,
    pub error_message: String,
}

impl From<&UrlStatus> for StatusRow {
    fn from(status: &UrlStatus) -> Self {
        Self {
            url: status.url.clone(),
            state: status.state.as_str().to_string(),
            icon: status.state.icon().to_string(),
            css_class: status.state.as_str().to_lowercase(),
            status_code: status
                .status_code
                .map(|code| code.to_string())
                .unwrap_or_else(|| "-".to_string()),
            checked_at: status
                .checked_at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string(),
            latency_ms: status.latency_ms(),
            error_message: status.error_message.clone().unwrap_or_default(),
        }
    }
}

/// 把快照转换为按URL排序的展示行
pub fn status_rows(snapshot: &StatusSnapshot) -> Vec<StatusRow> {
    snapshot.sorted().into_iter().map(StatusRow::from).collect()
}

/// 各状态的数量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct StatusCounts {
    pub total: usize,
    pub up: usize,
    pub degraded: usize,
    pub down: usize,
}

impl From<&StatusSnapshot> for StatusCounts {
    fn from(snapshot: &StatusSnapshot) -> Self {
        Self {
            total: snapshot.len(),
            up: snapshot.count(HealthStatus::Up),
            degraded: snapshot.count(HealthStatus::Degraded),
            down: snapshot.count(HealthStatus::Down),
        }
    }
}
