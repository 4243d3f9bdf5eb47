//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 检测间隔（秒）
    pub interval: u64,
    /// 要监控的URL列表，允许重复，允许为空
    #[serde(default)]
    pub urls: Vec<String>,
    /// 单次请求超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
    /// 同一URL上一次检测未完成时是否跳过新的检测
    #[serde(default)]
    pub skip_overlapping: bool,
    /// 日志文件路径，设为空字符串可关闭文件日志
    #[serde(default = "default_log_file")]
    pub log_file: Option<PathBuf>,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
}

/// Web 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
        }
    }
}

impl WebConfig {
    /// 解析监听地址
    pub fn socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.bind_address, self.port)
            .parse()
            .map_err(|e| format!("无效的监听地址 {}:{}: {}", self.bind_address, self.port, e))
    }
}

impl Config {
    /// 检测间隔
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }

    /// 单次请求超时时间
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// 实际使用的日志文件路径，空路径视为关闭
    pub fn log_file_path(&self) -> Option<&PathBuf> {
        self.log_file
            .as_ref()
            .filter(|path| !path.as_os_str().is_empty())
    }
}

// 默认值函数
fn default_timeout() -> u64 {
    10
}
fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("monitor.log"))
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}

/// 配置验证函数
///
/// URL本身不做校验：格式错误的URL会在检测时失败并记录为 DOWN。
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    if config.interval == 0 {
        return Err("检测间隔不能为0".to_string());
    }

    if config.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if config.web.port == 0 {
        return Err("无效的Web服务器端口: 0".to_string());
    }

    if config.web.bind_address.trim().is_empty() {
        return Err("Web服务器绑定地址不能为空".to_string());
    }

    // 监听地址必须是IP，主机名（如 localhost）无法直接绑定
    config.web.socket_addr()?;

    Ok(())
}
