//! Web服务器实现
//!
//! 提供HTTP服务器和路由管理

use super::{handlers, WebAppState};
use crate::config::WebConfig;
use crate::error::{Result, SiteVitalsError};
use crate::status::StatusTable;
use axum::{routing::get, Router};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web服务器
pub struct WebServer {
    /// 配置
    config: WebConfig,
    /// 状态表
    table: StatusTable,
    /// 关闭信号接收器
    shutdown_rx: Option<broadcast::Receiver<()>>,
}

impl WebServer {
    /// 创建新的Web服务器
    pub fn new(
        config: WebConfig,
        table: StatusTable,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            config,
            table,
            shutdown_rx: Some(shutdown_rx),
        }
    }

    /// 创建路由
    pub fn create_router(table: StatusTable) -> Router {
        let state = WebAppState::new(table);

        Router::new()
            .route("/", get(handlers::index))
            .route("/api/status", get(handlers::api_status))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    /// 启动Web服务器，直到收到关闭信号
    pub async fn start(&mut self) -> Result<()> {
        let addr = self.config.socket_addr().map_err(SiteVitalsError::Web)?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| SiteVitalsError::Web(format!("绑定地址 {} 失败: {}", addr, e)))?;

        self.serve(listener).await
    }

    /// 在已绑定的监听器上提供服务
    pub async fn serve(&mut self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self
            .shutdown_rx
            .take()
            .ok_or_else(|| SiteVitalsError::Web("关闭信号接收器已被使用".to_string()))?;

        let router = Self::create_router(self.table.clone());

        if let Ok(addr) = listener.local_addr() {
            info!("📡 Web服务器已启动: http://{}", addr);
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
                info!("接收到关闭信号，正在关闭Web服务器...");
            })
            .await?;

        info!("Web服务器已关闭");
        Ok(())
    }
}
