//! 健康检测模块
//!
//! 提供HTTP健康检测、结果分类和轮询调度功能

pub mod checker;
pub mod result;
pub mod scheduler;

// 重新导出主要类型
pub use checker::{HealthChecker, HttpHealthChecker};
pub use result::{log_check_event, HealthResult, HealthStatus};
pub use scheduler::{Poller, Scheduler, SchedulerStatus};
