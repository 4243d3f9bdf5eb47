//! Site Vitals - 极简网站可用性监控工具
//!
//! 按固定间隔并发检测一组URL，支持：
//! - UP / DEGRADED / DOWN 三态分类
//! - 内存状态表与一致性快照
//! - 状态页面与JSON接口
//! - 结构化日志记录

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod service;
pub mod status;
pub mod web;

// 重新导出主要类型
pub use config::{Config, WebConfig};
pub use error::SiteVitalsError;
pub use health::{HealthChecker, HealthResult, HealthStatus, Poller, Scheduler};
pub use status::{StatusSnapshot, StatusTable, UrlStatus};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
