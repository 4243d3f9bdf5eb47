//! Site Vitals 主程序入口
//!
//! 极简网站可用性监控工具

use anyhow::{Context, Result};
use clap::Parser;
use site_vitals::cli::args::{Args, Commands};
use site_vitals::cli::commands::{
    CheckCommand, Command, StartCommand, ValidateCommand, VersionCommand,
};
use site_vitals::config::load_config;
use site_vitals::logging::{LogConfig, LoggingSystem};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // 解析命令行参数
    let args = Args::parse();
    let command = args.command();

    // 只有启动命令写日志文件；配置错误留给命令本身在日志初始化后报告
    let file_path = match command {
        Commands::Start { .. } => load_config(args.get_config_path())
            .await
            .ok()
            .and_then(|config| config.log_file_path().cloned()),
        _ => None,
    };

    // 初始化日志系统
    let log_config = LogConfig {
        level: args.log_level.clone().into(),
        console: true,
        file_path,
        json_format: false,
    };

    let _logging_system = LoggingSystem::setup_logging(log_config).context("初始化日志系统失败")?;

    if matches!(command, Commands::Start { .. }) {
        info!("Site Vitals v{} 启动", site_vitals::VERSION);
    }

    // 执行命令
    if let Err(e) = execute_command(&args, &command).await {
        error!("命令执行失败: {}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// 执行CLI命令
async fn execute_command(args: &Args, command: &Commands) -> Result<()> {
    let handler: Box<dyn Command> = match command {
        Commands::Start { .. } => Box::new(StartCommand),
        Commands::Check { .. } => Box::new(CheckCommand),
        Commands::Validate => Box::new(ValidateCommand),
        Commands::Version { .. } => Box::new(VersionCommand),
    };

    handler.execute(args).await.map_err(|e| anyhow::anyhow!(e))
}
