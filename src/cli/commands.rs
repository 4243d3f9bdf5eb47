//! 命令处理逻辑
//!
//! 实现各种CLI命令的处理逻辑

use crate::cli::args::{Args, Commands, OutputFormat};
use crate::config::{load_config, validate_config, Config};
use crate::error::{ConfigError, Result};
use crate::health::{HealthStatus, HttpHealthChecker, Poller};
use crate::service::ServiceLauncher;
use crate::status::{StatusSnapshot, StatusTable};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// 命令处理器trait
#[async_trait]
pub trait Command: Send + Sync {
    /// 执行命令
    async fn execute(&self, args: &Args) -> Result<()>;
}

/// 加载配置并应用命令行覆盖项
///
/// 覆盖后重新验证，确保 `--interval 0` 这类输入同样被拒绝。
pub async fn load_effective_config(args: &Args) -> Result<Config> {
    let mut config = load_config(args.get_config_path()).await?;

    if let Commands::Start { interval, port } = args.command() {
        if let Some(interval) = interval {
            config.interval = interval;
        }
        if let Some(port) = port {
            config.web.port = port;
        }
        validate_config(&config).map_err(ConfigError::ValidationError)?;
    }

    Ok(config)
}

/// 启动命令
pub struct StartCommand;

#[async_trait]
impl Command for StartCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let config = load_effective_config(args).await?;

        info!(
            "配置加载成功: {} 个URL, 间隔 {} 秒",
            config.urls.len(),
            config.interval
        );

        let (shutdown_tx, _) = broadcast::channel(1);
        let signal_tx = shutdown_tx.clone();

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("接收到Ctrl+C信号，正在关闭...");
                let _ = signal_tx.send(());
            }
        });

        ServiceLauncher::run(config, shutdown_tx).await
    }
}

/// 单次检测命令
pub struct CheckCommand;

#[async_trait]
impl Command for CheckCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let format = match args.command() {
            Commands::Check { format } => format,
            _ => OutputFormat::Text,
        };

        let config = load_effective_config(args).await?;
        let checker = Arc::new(HttpHealthChecker::new(config.request_timeout())?);
        let poller = Poller::new(checker, StatusTable::new(), config.interval())?;

        let snapshot = poller.check_once(&config.urls).await;

        match format {
            OutputFormat::Json => {
                let statuses: Vec<_> = snapshot.sorted().into_iter().cloned().collect();
                println!("{}", serde_json::to_string_pretty(&statuses)?);
            }
            OutputFormat::Text => print_snapshot(&snapshot),
        }

        Ok(())
    }
}

/// 以文本形式输出快照
fn print_snapshot(snapshot: &StatusSnapshot) {
    if snapshot.is_empty() {
        println!("没有需要检测的URL");
        return;
    }

    for status in snapshot.sorted() {
        let code = status
            .status_code
            .map(|code| code.to_string())
            .unwrap_or_else(|| "-".to_string());
        print!(
            "{} {:<9} {:>4} {:>6}ms  {}",
            status.state.icon(),
            status.state.as_str(),
            code,
            status.latency_ms(),
            status.url
        );
        match &status.error_message {
            Some(message) => println!(" ({})", message),
            None => println!(),
        }
    }

    println!();
    println!(
        "总数: {}  正常: {}  降级: {}  异常: {}",
        snapshot.len(),
        snapshot.count(HealthStatus::Up),
        snapshot.count(HealthStatus::Degraded),
        snapshot.count(HealthStatus::Down)
    );
}

/// 验证配置命令
pub struct ValidateCommand;

#[async_trait]
impl Command for ValidateCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        let path = args.get_config_path();
        let config = load_config(&path).await?;

        println!("✅ 配置文件验证通过: {}", path.display());
        println!("  检测间隔: {} 秒", config.interval);
        println!("  请求超时: {} 秒", config.request_timeout_seconds);
        println!("  URL数量: {}", config.urls.len());
        for url in &config.urls {
            println!("    - {}", url);
        }
        println!(
            "  Web地址: {}:{}",
            config.web.bind_address, config.web.port
        );
        match config.log_file_path() {
            Some(path) => println!("  日志文件: {}", path.display()),
            None => println!("  日志文件: 未启用"),
        }

        Ok(())
    }
}

/// 版本命令
pub struct VersionCommand;

#[async_trait]
impl Command for VersionCommand {
    async fn execute(&self, args: &Args) -> Result<()> {
        if let Commands::Version { format } = args.command() {
            match format {
                OutputFormat::Json => {
                    let version_info = serde_json::json!({
                        "name": crate::APP_NAME,
                        "version": crate::VERSION,
                        "description": crate::APP_DESCRIPTION
                    });
                    println!("{}", serde_json::to_string_pretty(&version_info)?);
                }
                OutputFormat::Text => {
                    println!("{} v{}", crate::APP_NAME, crate::VERSION);
                    println!("{}", crate::APP_DESCRIPTION);
                }
            }
        }
        Ok(())
    }
}
