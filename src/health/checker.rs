//! HTTP健康检测器实现
//!
//! 对单个URL发起GET请求并对结果进行分类

use crate::error::{HealthCheckError, Result};
use crate::health::result::HealthResult;
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tokio::time::timeout;

/// 健康检测器trait，定义检测接口
#[async_trait]
pub trait HealthChecker: Send + Sync {
    /// 执行一次健康检测
    ///
    /// 请求失败也是正常的检测结果（DOWN），因此该方法不会返回错误。
    ///
    /// # 参数
    /// * `url` - 要检测的URL，按配置原样使用
    ///
    /// # 返回
    /// * `HealthResult` - 检测结果
    async fn check(&self, url: &str) -> HealthResult;
}

/// HTTP健康检测器实现
#[derive(Debug, Clone)]
pub struct HttpHealthChecker {
    /// HTTP客户端
    client: Client,
    /// 单次请求超时时间
    request_timeout: Duration,
}

impl HttpHealthChecker {
    /// 创建新的HTTP健康检测器
    ///
    /// # 参数
    /// * `request_timeout` - 单次请求的超时时间
    ///
    /// # 返回
    /// * `Result<Self>` - 检测器实例
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(HealthCheckError::ClientBuild)?;

        Ok(Self {
            client,
            request_timeout,
        })
    }

    /// 当前的请求超时时间
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// 格式化请求错误信息，使其更加清晰易读
    fn format_request_error(error: &reqwest::Error) -> String {
        if error.is_timeout() {
            "Request timeout".to_string()
        } else if error.is_connect() {
            let error_str = format!("{error:?}");
            if error_str.contains("dns") || error_str.contains("failed to lookup") {
                "DNS resolution failed".to_string()
            } else {
                "Connection refused".to_string()
            }
        } else if error.is_builder() {
            "Invalid URL".to_string()
        } else if error.is_request() {
            "Invalid request".to_string()
        } else {
            let error_str = error.to_string();
            if error_str.contains("certificate")
                || error_str.contains("tls")
                || error_str.contains("ssl")
            {
                "SSL/TLS certificate error".to_string()
            } else {
                format!("Request failed: {error_str}")
            }
        }
    }
}

#[async_trait]
impl HealthChecker for HttpHealthChecker {
    async fn check(&self, url: &str) -> HealthResult {
        let start_time = Instant::now();

        // 客户端自身也设置了超时，这里再包一层保证请求一定有上限
        let response_result = timeout(self.request_timeout, self.client.get(url).send()).await;

        let response_time = start_time.elapsed();

        let result = match response_result {
            Ok(Ok(response)) => HealthResult::completed(url, response.status().as_u16()),
            Ok(Err(e)) => HealthResult::failed(url, Self::format_request_error(&e)),
            Err(_) => HealthResult::failed(url, "Request timeout"),
        };

        result.with_response_time(response_time)
    }
}
