//! 配置加载器实现
//!
//! 提供JSON/TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "urls.json";

/// 配置加载器trait，定义配置加载接口
#[async_trait]
pub trait ConfigLoader: Send + Sync {
    /// 从文件加载配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        // 检查文件是否存在
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {}", e)))?;

        let config = self.load_from_string(&content).await?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    /// 从字符串加载配置
    ///
    /// # 参数
    /// * `content` - 配置文件内容
    ///
    /// # 返回
    /// * `Result<Config>` - 加载的配置或错误
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 替换字符串中 `${VAR_NAME}` 形式的环境变量
fn substitute_env_vars(content: &str) -> Result<String> {
    static ENV_VAR_REGEX: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();

    let env_var_regex = ENV_VAR_REGEX
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}"))
        .as_ref()
        .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {}", e)))?;

    let mut result = content.to_string();

    for captures in env_var_regex.captures_iter(content) {
        let full_match = &captures[0];
        let var_name = &captures[1];

        match std::env::var(var_name) {
            Ok(value) => {
                result = result.replace(full_match, &value);
            }
            Err(_) => {
                return Err(ConfigError::EnvVarError {
                    var: var_name.to_string(),
                }
                .into());
            }
        }
    }

    Ok(result)
}

/// JSON配置加载器实现
#[derive(Debug, Clone)]
pub struct JsonConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl JsonConfigLoader {
    /// 创建新的JSON配置加载器
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }
}

impl Default for JsonConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConfigLoader for JsonConfigLoader {
    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let processed = if self.enable_env_substitution {
            substitute_env_vars(content)?
        } else {
            content.to_string()
        };

        let config: Config = serde_json::from_str(&processed)
            .map_err(|e| ConfigError::ParseError(format!("JSON解析失败: {}", e)))?;

        self.validate(&config)?;
        Ok(config)
    }
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }
}

impl Default for TomlConfigLoader {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let processed = if self.enable_env_substitution {
            substitute_env_vars(content)?
        } else {
            content.to_string()
        };

        let config: Config = toml::from_str(&processed)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {}", e)))?;

        self.validate(&config)?;
        Ok(config)
    }
}

/// 根据文件扩展名选择加载器并加载配置
///
/// 没有扩展名时按JSON处理。
pub async fn load_config<P: AsRef<Path> + Send>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "json" | "" => JsonConfigLoader::default().load_from_file(path).await,
        "toml" => TomlConfigLoader::default().load_from_file(path).await,
        other => Err(ConfigError::UnsupportedFormat {
            extension: other.to_string(),
        }
        .into()),
    }
}

/// 获取默认配置文件路径
///
/// 优先使用当前目录下的 `urls.json`，否则使用用户配置目录。
pub fn get_default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join(crate::APP_NAME).join(DEFAULT_CONFIG_FILE))
        .unwrap_or(local)
}
