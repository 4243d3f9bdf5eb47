//! 服务启动模块
//!
//! 负责组装状态表、轮询器和Web服务器，并处理关闭流程

use crate::config::Config;
use crate::error::{Result, SiteVitalsError};
use crate::health::{HttpHealthChecker, Poller, Scheduler};
use crate::status::StatusTable;
use crate::web::WebServer;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info};

/// 服务组件结构
pub struct ServiceComponents {
    /// URL状态表
    pub table: StatusTable,
    /// 轮询器
    pub poller: Arc<Poller>,
}

/// 服务启动器
pub struct ServiceLauncher;

impl ServiceLauncher {
    /// 初始化服务组件，轮询器订阅给定的关闭信号
    pub fn initialize_components(
        config: &Config,
        shutdown_tx: &broadcast::Sender<()>,
    ) -> Result<ServiceComponents> {
        let table = StatusTable::new();
        let checker = Arc::new(HttpHealthChecker::new(config.request_timeout())?);
        let poller = Poller::new(checker, table.clone(), config.interval())?
            .with_skip_overlapping(config.skip_overlapping)
            .with_shutdown_signal(shutdown_tx.subscribe());

        Ok(ServiceComponents {
            table,
            poller: Arc::new(poller),
        })
    }

    /// 运行监控服务，直到收到关闭信号
    ///
    /// # 参数
    /// * `config` - 已验证的配置
    /// * `shutdown_tx` - 关闭信号发送端，发送后轮询器和Web服务器都会退出
    pub async fn run(config: Config, shutdown_tx: broadcast::Sender<()>) -> Result<()> {
        let components = Self::initialize_components(&config, &shutdown_tx)?;

        // 先订阅，避免错过启动期间发出的关闭信号
        let mut shutdown_rx = shutdown_tx.subscribe();
        let web_shutdown_rx = shutdown_tx.subscribe();

        info!("🔍 开始监控 {} 个URL", config.urls.len());
        components.poller.start(config.urls.clone()).await?;

        let mut web_server =
            WebServer::new(config.web.clone(), components.table.clone(), web_shutdown_rx);
        let mut web_handle = tokio::spawn(async move { web_server.start().await });

        // Web服务器提前退出（如端口被占用）时立即结束，而不是等到关闭信号
        let early_exit = tokio::select! {
            _ = shutdown_rx.recv() => {
                info!("正在停止服务...");
                None
            }
            result = &mut web_handle => Some(result),
        };

        components.poller.stop().await?;

        let web_result = match early_exit {
            Some(result) => result,
            None => web_handle.await,
        };

        match web_result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Web服务器运行失败: {}", e);
                return Err(e);
            }
            Err(e) => {
                error!("Web服务器任务异常结束: {}", e);
                return Err(SiteVitalsError::Web(e.to_string()));
            }
        }

        info!("服务已停止");
        Ok(())
    }
}
