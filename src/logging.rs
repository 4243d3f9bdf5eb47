//! 日志系统模块
//!
//! 基于 tracing 的日志初始化，同时输出到控制台和追加写入的日志文件

use log::LevelFilter;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

/// 日志时间格式
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 全局初始化结果，只初始化一次
static INIT_RESULT: OnceLock<Result<LogConfig, String>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone, PartialEq)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 是否输出到控制台
    pub console: bool,
    /// 日志文件路径（可选，追加写入）
    pub file_path: Option<PathBuf>,
    /// 控制台是否使用JSON格式
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            console: true,
            file_path: None,
            json_format: false,
        }
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    /// 实际生效的配置
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 全局订阅者只能设置一次，重复调用时返回首次初始化时的配置。
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `Result<LoggingSystem, anyhow::Error>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let result = INIT_RESULT.get_or_init(|| {
            Self::perform_initialization(&config)
                .map(|()| config.clone())
                .map_err(|e| e.to_string())
        });

        match result {
            Ok(active) => Ok(Self {
                config: active.clone(),
            }),
            Err(e) => Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e)),
        }
    }

    /// 当前生效的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        matches!(INIT_RESULT.get(), Some(Ok(_)))
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        match LogTracer::init() {
            Ok(()) => Ok(()),
            // 测试中可能已有其他 logger，忽略即可
            Err(e) if e.to_string().contains("already") => Ok(()),
            Err(e) => Err(anyhow::anyhow!("LogTracer初始化失败: {}", e)),
        }
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter = EnvFilter::from_default_env()
            .add_directive(Self::convert_level_to_directive(config.level));

        let timer = || fmt::time::ChronoLocal::new(TIME_FORMAT.to_string());

        let console_text = (config.console && !config.json_format)
            .then(|| fmt::layer().with_timer(timer()).with_target(false));
        let console_json =
            (config.console && config.json_format).then(|| fmt::layer().json().with_timer(timer()));

        let file_layer = match &config.file_path {
            Some(path) => {
                let file = open_log_file(path)?;
                Some(
                    fmt::layer()
                        .with_writer(Mutex::new(file))
                        .with_timer(timer())
                        .with_ansi(false)
                        .with_target(false),
                )
            }
            None => None,
        };

        let subscriber = registry()
            .with(env_filter)
            .with(console_text)
            .with(console_json)
            .with(file_layer);

        // log 桥接已由 init_log_tracer 安装，这里只设置全局订阅者
        match tracing::subscriber::set_global_default(subscriber) {
            Ok(()) => {
                tracing::debug!("日志系统初始化完成: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                if error_msg.contains("a global default trace dispatcher has already been set") {
                    // 已有全局订阅者（通常发生在测试中）
                    Ok(())
                } else {
                    Err(anyhow::anyhow!(
                        "tracing subscriber初始化失败: {}",
                        error_msg
                    ))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> tracing_subscriber::filter::Directive {
        use tracing_subscriber::filter::{Directive, LevelFilter as TracingLevel};
        let level = match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        };
        Directive::from(level)
    }
}

/// 以追加模式打开日志文件，必要时创建父目录
pub fn open_log_file(path: &Path) -> anyhow::Result<File> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .map_err(|e| anyhow::anyhow!("创建日志目录失败 {}: {}", parent.display(), e))?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("打开日志文件失败 {}: {}", path.display(), e))
}
