//! 错误类型
//!
//! 只覆盖启动和运行环境的问题；被监控站点的失败属于检测结果而不是错误

use thiserror::Error;

/// Site Vitals 应用程序的主要错误类型
#[derive(Error, Debug)]
pub enum SiteVitalsError {
    /// 读取或校验 urls 配置失败
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// 轮询器或检测器无法构建
    #[error("监控器初始化失败: {0}")]
    HealthCheck(#[from] HealthCheckError),

    /// 状态页服务绑定或运行失败
    #[error("状态页服务异常: {0}")]
    Web(String),

    #[error("读写失败: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON输出失败: {0}")]
    Json(#[from] serde_json::Error),
}

/// 配置文件相关错误
#[derive(Error, Debug)]
pub enum ConfigError {
    /// 内容无法解析为 JSON 或 TOML
    #[error("无法解析配置: {0}")]
    ParseError(String),

    /// 字段取值不合法，例如间隔为0
    #[error("配置无效: {0}")]
    ValidationError(String),

    #[error("找不到配置文件: {path}")]
    FileNotFound { path: String },

    /// `${VAR}` 引用了未设置的环境变量
    #[error("环境变量 {var} 未设置")]
    EnvVarError { var: String },

    #[error("无法识别的配置扩展名: .{extension}")]
    UnsupportedFormat { extension: String },
}

/// 监控器构建错误
///
/// 单次检测的网络失败不是错误，会被记录为 DOWN 状态；
/// 这里只包含启动阶段可能出现的问题。
#[derive(Error, Debug)]
pub enum HealthCheckError {
    #[error("无法创建HTTP客户端: {0}")]
    ClientBuild(#[from] reqwest::Error),

    /// 检测间隔无效
    #[error("检测间隔必须大于0")]
    InvalidInterval,
}

pub type Result<T> = std::result::Result<T, SiteVitalsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_conversion() {
        let err: SiteVitalsError = ConfigError::FileNotFound {
            path: "urls.json".to_string(),
        }
        .into();

        assert!(matches!(err, SiteVitalsError::Config(_)));
        assert!(err.to_string().contains("urls.json"));
    }

    #[test]
    fn test_health_check_error_display() {
        let err: SiteVitalsError = HealthCheckError::InvalidInterval.into();
        assert!(err.to_string().contains("检测间隔"));
    }
}
