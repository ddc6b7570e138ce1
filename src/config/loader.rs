//! 配置加载器实现
//!
//! 提供TOML配置文件解析、环境变量替换和错误处理功能

use crate::config::types::{validate_config, Config};
use crate::error::{ConfigError, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};

/// 环境变量覆盖的前缀
pub const ENV_PREFIX: &str = "SENTINEL_";

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
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config>;

    /// 从字符串加载配置
    async fn load_from_string(&self, content: &str) -> Result<Config>;

    /// 验证配置
    fn validate(&self, config: &Config) -> Result<()>;
}

/// TOML配置加载器实现
#[derive(Debug, Clone)]
pub struct TomlConfigLoader {
    /// 是否启用环境变量替换
    enable_env_substitution: bool,
}

impl TomlConfigLoader {
    /// 创建新的TOML配置加载器
    ///
    /// # 参数
    /// * `enable_env_substitution` - 是否启用 `${VAR}` 环境变量替换
    pub fn new(enable_env_substitution: bool) -> Self {
        Self {
            enable_env_substitution,
        }
    }

    /// 替换字符串中的环境变量，未设置的变量视为错误
    fn substitute_env_vars(&self, content: &str) -> Result<String> {
        if !self.enable_env_substitution {
            return Ok(content.to_string());
        }

        // 匹配 ${VAR_NAME} 格式的环境变量
        let env_var_regex = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
            .map_err(|e| ConfigError::ParseError(format!("正则表达式错误: {e}")))?;

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

    /// 解析TOML内容并应用 `SENTINEL_*` 环境变量覆盖
    fn parse_toml(&self, content: &str) -> Result<Config> {
        let processed_content = self.substitute_env_vars(content)?;

        let mut config: Config = toml::from_str(&processed_content)
            .map_err(|e| ConfigError::ParseError(format!("TOML解析失败: {e}")))?;

        apply_env_overrides(&mut config)?;

        Ok(config)
    }

    /// 加载配置文件，文件不存在时使用默认配置
    ///
    /// # 参数
    /// * `path` - 配置文件路径
    ///
    /// # 返回
    /// * `Result<Config>` - 配置，文件存在但无法解析或验证失败时返回错误
    pub async fn load_or_default<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();
        if path.exists() {
            return self.load_from_file(path).await;
        }

        log::info!("配置文件不存在，使用默认配置: {}", path.display());
        self.load_from_string("").await
    }
}

#[async_trait]
impl ConfigLoader for TomlConfigLoader {
    async fn load_from_file<P: AsRef<Path> + Send>(&self, path: P) -> Result<Config> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_string_lossy().to_string(),
            }
            .into());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ConfigError::ParseError(format!("读取文件失败: {e}")))?;

        let config = self.parse_toml(&content)?;
        self.validate(&config)?;

        log::info!("成功加载配置文件: {}", path.display());
        log::debug!("配置内容: {:?}", config);

        Ok(config)
    }

    async fn load_from_string(&self, content: &str) -> Result<Config> {
        let config = self.parse_toml(content)?;
        self.validate(&config)?;

        log::debug!("成功解析配置字符串");

        Ok(config)
    }

    fn validate(&self, config: &Config) -> Result<()> {
        validate_config(config).map_err(|e| ConfigError::ValidationError(e).into())
    }
}

/// 读取 `SENTINEL_*` 环境变量覆盖配置项
///
/// 支持 `SENTINEL_LOG_LEVEL`、`SENTINEL_CHECK_INTERVAL`、`SENTINEL_REQUEST_TIMEOUT`、
/// `SENTINEL_DATA_FILE`、`SENTINEL_WEBHOOK_URL`、`SENTINEL_WEB_PORT`。
fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(level) = env_override("LOG_LEVEL") {
        config.log_level = level;
    }
    if let Some(format) = env_override("LOG_FORMAT") {
        config.log_format = format;
    }
    if let Some(log_file) = env_override("LOG_FILE") {
        config.log_file = Some(PathBuf::from(log_file));
    }
    if let Some(interval) = env_override("CHECK_INTERVAL") {
        config.worker.check_interval_seconds = parse_env_number("CHECK_INTERVAL", &interval)?;
    }
    if let Some(timeout) = env_override("REQUEST_TIMEOUT") {
        config.worker.request_timeout_seconds = parse_env_number("REQUEST_TIMEOUT", &timeout)?;
    }
    if let Some(data_file) = env_override("DATA_FILE") {
        config.store.data_file = Some(PathBuf::from(data_file));
    }
    if let Some(webhook_url) = env_override("WEBHOOK_URL") {
        config.notification.webhook_url = Some(webhook_url);
    }
    if let Some(port) = env_override("WEB_PORT") {
        config.web.port = parse_env_number("WEB_PORT", &port)?;
    }
    Ok(())
}

fn env_override(key: &str) -> Option<String> {
    std::env::var(format!("{ENV_PREFIX}{key}"))
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn parse_env_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        ConfigError::ParseError(format!("环境变量 {ENV_PREFIX}{key} 的值无效: {value}")).into()
    })
}

/// 获取默认配置文件路径
///
/// 当前目录存在 `config.toml` 时优先使用，否则为 `<配置目录>/sentinel/config.toml`
pub fn get_default_config_path() -> PathBuf {
    if Path::new("config.toml").exists() {
        return PathBuf::from("config.toml");
    }

    dirs::config_dir()
        .map(|config_dir| config_dir.join(crate::APP_NAME).join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

/// `init` 命令生成的配置文件模板
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# sentinel 配置文件

# 日志级别: trace, debug, info, warn, error
log_level = "info"
# 日志格式: text 或 json
log_format = "text"
# 日志文件路径，注释掉则输出到标准输出
# log_file = "/var/log/sentinel.log"

[worker]
# 检测间隔（秒）
check_interval_seconds = 5
# 单次探测超时时间（秒）
request_timeout_seconds = 5

[store]
# 快照文件路径，注释掉则只保存在内存中
# data_file = "/var/lib/sentinel/data.json"
connect_attempts = 5
connect_retry_delay_seconds = 2
retention_per_target = 1000
flush_interval_seconds = 30
# 启动时预置的目标
seed_targets = []

[notification]
# 连续失败达到阈值或恢复时推送的 webhook，值中可以引用环境变量
# webhook_url = "https://hooks.example.com/sentinel"
# alert_template = "🚨 {{url}} 连续失败 {{consecutive_failures}} 次"
# recovery_template = "✅ {{url}} 已恢复"

[web]
enabled = true
bind_address = "0.0.0.0"
port = 3000
history_limit = 20
# 仪表板静态页面目录
static_dir = "./web"
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::time::Duration;

    const TEST_CONFIG_TOML: &str = r#"
log_level = "debug"

[worker]
check_interval_seconds = 10
request_timeout_seconds = 3

[store]
seed_targets = ["https://example.com/health"]

[web]
port = 8088
"#;

    const TEST_CONFIG_WITH_ENV_VARS: &str = r#"
[notification]
webhook_url = "${TEST_SENTINEL_HOOK}"
"#;

    #[tokio::test]
    #[serial]
    async fn test_toml_parsing() {
        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        assert_eq!(config.log_level, "debug");
        assert_eq!(config.worker.check_interval(), Duration::from_secs(10));
        assert_eq!(config.worker.request_timeout(), Duration::from_secs(3));
        assert_eq!(config.store.seed_targets, vec!["https://example.com/health"]);
        assert_eq!(config.web.port, 8088);
        // 未配置的项使用默认值
        assert_eq!(config.store.connect_attempts, 5);
        assert_eq!(config.web.history_limit, 20);
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution() {
        env::set_var("TEST_SENTINEL_HOOK", "https://hooks.test/abc");

        let loader = TomlConfigLoader::new(true);
        let config = loader
            .load_from_string(TEST_CONFIG_WITH_ENV_VARS)
            .await
            .unwrap();

        assert_eq!(
            config.notification.webhook_url,
            Some("https://hooks.test/abc".to_string())
        );

        env::remove_var("TEST_SENTINEL_HOOK");
    }

    #[tokio::test]
    #[serial]
    async fn test_env_var_substitution_missing_var() {
        env::remove_var("TEST_SENTINEL_HOOK");

        let loader = TomlConfigLoader::new(true);
        let result = loader.load_from_string(TEST_CONFIG_WITH_ENV_VARS).await;

        assert!(result.unwrap_err().to_string().contains("TEST_SENTINEL_HOOK"));
    }

    #[tokio::test]
    #[serial]
    async fn test_prefixed_env_overrides() {
        env::set_var("SENTINEL_CHECK_INTERVAL", "15");
        env::set_var("SENTINEL_WEB_PORT", "9090");
        env::set_var("SENTINEL_LOG_FORMAT", "json");

        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_string(TEST_CONFIG_TOML).await.unwrap();

        env::remove_var("SENTINEL_CHECK_INTERVAL");
        env::remove_var("SENTINEL_WEB_PORT");
        env::remove_var("SENTINEL_LOG_FORMAT");

        assert_eq!(config.log_format, "json");
        assert_eq!(config.worker.check_interval_seconds, 15);
        assert_eq!(config.web.port, 9090);
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_prefixed_env_override() {
        env::set_var("SENTINEL_CHECK_INTERVAL", "soon");

        let loader = TomlConfigLoader::new(false);
        let result = loader.load_from_string("").await;

        env::remove_var("SENTINEL_CHECK_INTERVAL");

        assert!(result.unwrap_err().to_string().contains("SENTINEL_CHECK_INTERVAL"));
    }

    #[tokio::test]
    #[serial]
    async fn test_load_from_file_and_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        tokio::fs::write(&path, TEST_CONFIG_TOML).await.unwrap();

        let loader = TomlConfigLoader::new(false);
        let config = loader.load_from_file(&path).await.unwrap();
        assert_eq!(config.web.port, 8088);

        let missing = dir.path().join("missing.toml");
        let err = loader.load_from_file(&missing).await.unwrap_err();
        assert!(err.to_string().contains("missing.toml"));

        let defaults = loader.load_or_default(&missing).await.unwrap();
        assert_eq!(defaults.worker.check_interval_seconds, 5);
    }

    #[tokio::test]
    #[serial]
    async fn test_validation_failure_is_reported() {
        let loader = TomlConfigLoader::new(false);
        let result = loader
            .load_from_string("[worker]\ncheck_interval_seconds = 0\n")
            .await;

        assert!(result.unwrap_err().to_string().contains("验证失败"));
    }

    #[tokio::test]
    #[serial]
    async fn test_default_template_is_valid() {
        let loader = TomlConfigLoader::new(true);
        let config = loader.load_from_string(DEFAULT_CONFIG_TEMPLATE).await.unwrap();

        assert_eq!(config.worker.check_interval_seconds, 5);
        assert!(config.notification.webhook_url.is_none());
    }

    #[test]
    fn test_substitute_env_vars_disabled() {
        let loader = TomlConfigLoader::new(false);
        let content = "test ${VAR} content";
        let result = loader.substitute_env_vars(content).unwrap();
        assert_eq!(result, content);
    }

    #[test]
    fn test_get_default_config_path() {
        let path = get_default_config_path();
        assert!(path.to_string_lossy().contains("config.toml"));
    }
}
