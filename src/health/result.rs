//! 健康检测结果数据结构
//!
//! 定义单次检测的结果类型和状态分类规则

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 状态码达到该值即视为降级
pub const DEGRADED_STATUS_THRESHOLD: u16 = 400;

/// 健康状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthStatus {
    /// 请求完成且状态码小于400
    Up,
    /// 请求完成但状态码大于等于400
    Degraded,
    /// 请求未能完成
    Down,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl HealthStatus {
    /// 根据HTTP状态码分类，`None` 表示请求没有完成
    pub fn classify(status_code: Option<u16>) -> Self {
        match status_code {
            None => HealthStatus::Down,
            Some(code) if code >= DEGRADED_STATUS_THRESHOLD => HealthStatus::Degraded,
            Some(_) => HealthStatus::Up,
        }
    }

    /// 状态标签
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Up => "UP",
            HealthStatus::Degraded => "DEGRADED",
            HealthStatus::Down => "DOWN",
        }
    }

    /// 页面上使用的图标
    pub fn icon(&self) -> &'static str {
        match self {
            HealthStatus::Up => "✅",
            HealthStatus::Degraded => "⚠️",
            HealthStatus::Down => "❌",
        }
    }
}

/// 单次健康检测的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResult {
    /// 被检测的URL（与配置中完全一致）
    pub url: String,
    /// 检测完成时间
    pub timestamp: DateTime<Utc>,
    /// 健康状态
    pub status: HealthStatus,
    /// HTTP状态码（请求未完成时为空）
    pub status_code: Option<u16>,
    /// 响应时间
    #[serde(with = "duration_serde")]
    pub response_time: Duration,
    /// 错误信息（仅在请求失败时存在）
    pub error_message: Option<String>,
}

impl HealthResult {
    /// 根据已完成的HTTP响应创建结果
    pub fn completed(url: impl Into<String>, status_code: u16) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            status: HealthStatus::classify(Some(status_code)),
            status_code: Some(status_code),
            response_time: Duration::ZERO,
            error_message: None,
        }
    }

    /// 根据失败的请求创建结果
    pub fn failed(url: impl Into<String>, error_message: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            timestamp: Utc::now(),
            status: HealthStatus::Down,
            status_code: None,
            response_time: Duration::ZERO,
            error_message: Some(error_message.into()),
        }
    }

    /// 设置响应时间
    pub fn with_response_time(mut self, response_time: Duration) -> Self {
        self.response_time = response_time;
        self
    }

    /// 获取响应时间（毫秒）
    pub fn response_time_ms(&self) -> u64 {
        self.response_time.as_millis() as u64
    }
}

/// 输出单次检测的日志事件
///
/// 每次检测完成后调用一次。成功时记录状态码和耗时，失败时记录错误描述。
pub fn log_check_event(result: &HealthResult) {
    let duration_ms = result.response_time_ms();
    match (result.status, result.status_code) {
        (HealthStatus::Up, Some(code)) => tracing::info!(
            target: "site_vitals::check",
            url = %result.url,
            state = %result.status,
            status_code = code,
            duration_ms,
            "[{}] {} ({}) - {:?}",
            result.status,
            result.url,
            code,
            result.response_time
        ),
        (_, Some(code)) => tracing::warn!(
            target: "site_vitals::check",
            url = %result.url,
            state = %result.status,
            status_code = code,
            duration_ms,
            "[{}] {} ({}) - {:?}",
            result.status,
            result.url,
            code,
            result.response_time
        ),
        (_, None) => {
            let error = result.error_message.as_deref().unwrap_or("unknown error");
            tracing::error!(
                target: "site_vitals::check",
                url = %result.url,
                state = %result.status,
                error,
                duration_ms,
                "[{}] {} 无法访问 ({})",
                result.status,
                result.url,
                error
            )
        }
    }
}


/// Duration序列化模块
pub(crate) mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
