//! 配置数据结构定义
//!
//! 定义应用程序的配置结构体和验证逻辑。
//! 检测间隔和超时只有全局配置，告警阈值是固定常量，不可配置。

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// 日志格式: text 或 json
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// 日志文件路径，不配置时输出到标准输出
    pub log_file: Option<PathBuf>,
    /// 检测配置
    #[serde(default)]
    pub worker: WorkerConfig,
    /// 存储配置
    #[serde(default)]
    pub store: StoreConfig,
    /// 通知配置
    #[serde(default)]
    pub notification: NotificationConfig,
    /// Web 服务器配置
    #[serde(default)]
    pub web: WebConfig,
}

/// 检测配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerConfig {
    /// 检测间隔（秒）
    #[serde(default = "default_check_interval")]
    pub check_interval_seconds: u64,
    /// 单次探测超时时间（秒）
    #[serde(default = "default_timeout")]
    pub request_timeout_seconds: u64,
}

/// 存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    /// 快照文件路径，不配置时只保存在内存中
    pub data_file: Option<PathBuf>,
    /// 启动时连接存储的最大尝试次数
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
    /// 连接重试的初始间隔（秒）
    #[serde(default = "default_connect_retry_delay")]
    pub connect_retry_delay_seconds: u64,
    /// 每个目标保留的历史记录条数
    #[serde(default = "default_retention")]
    pub retention_per_target: usize,
    /// 快照写入间隔（秒）
    #[serde(default = "default_flush_interval")]
    pub flush_interval_seconds: u64,
    /// 启动时预置的目标
    #[serde(default)]
    pub seed_targets: Vec<String>,
}

/// 通知配置
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationConfig {
    /// webhook URL，不配置时只输出日志
    pub webhook_url: Option<String>,
    /// 告警消息模板
    pub alert_template: Option<String>,
    /// 恢复消息模板
    pub recovery_template: Option<String>,
}

/// Web 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebConfig {
    /// 是否启用
    #[serde(default = "default_web_enabled")]
    pub enabled: bool,
    /// 绑定地址
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// 端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 每个目标展示的历史记录条数
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    /// 仪表板静态页面目录，挂载在 `/`
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_file: None,
            worker: WorkerConfig::default(),
            store: StoreConfig::default(),
            notification: NotificationConfig::default(),
            web: WebConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// 检测间隔
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }

    /// 探测超时时间
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: default_check_interval(),
            request_timeout_seconds: default_timeout(),
        }
    }
}

impl StoreConfig {
    /// 连接重试的初始间隔
    pub fn connect_retry_delay(&self) -> Duration {
        Duration::from_secs(self.connect_retry_delay_seconds)
    }

    /// 快照写入间隔
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_seconds)
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            connect_attempts: default_connect_attempts(),
            connect_retry_delay_seconds: default_connect_retry_delay(),
            retention_per_target: default_retention(),
            flush_interval_seconds: default_flush_interval(),
            seed_targets: Vec::new(),
        }
    }
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: default_web_enabled(),
            bind_address: default_bind_address(),
            port: default_port(),
            history_limit: default_history_limit(),
            static_dir: default_static_dir(),
        }
    }
}

// 默认值函数
fn default_log_level() -> String {
    "info".to_string()
}
fn default_log_format() -> String {
    "text".to_string()
}
fn default_check_interval() -> u64 {
    5
}
fn default_timeout() -> u64 {
    5
}
fn default_connect_attempts() -> u32 {
    5
}
fn default_connect_retry_delay() -> u64 {
    2
}
fn default_retention() -> usize {
    1000
}
fn default_flush_interval() -> u64 {
    30
}
fn default_web_enabled() -> bool {
    true
}
fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    3000
}
fn default_history_limit() -> usize {
    20
}
fn default_static_dir() -> PathBuf {
    PathBuf::from("./web")
}

/// 判断URL是否为可探测的 http/https 地址
pub fn is_probe_url(url: &str) -> bool {
    let url = url.trim();
    (url.starts_with("http://") && url.len() > "http://".len())
        || (url.starts_with("https://") && url.len() > "https://".len())
}

/// 配置验证函数
///
/// # 参数
/// * `config` - 要验证的配置
///
/// # 返回
/// * `Result<(), String>` - 验证结果，错误时返回错误信息
pub fn validate_config(config: &Config) -> Result<(), String> {
    let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_log_levels.contains(&config.log_level.as_str()) {
        return Err(format!(
            "无效的日志级别: {}，支持的级别: {:?}",
            config.log_level, valid_log_levels
        ));
    }

    let valid_log_formats = ["text", "json"];
    if !valid_log_formats.contains(&config.log_format.as_str()) {
        return Err(format!(
            "无效的日志格式: {}，支持的格式: {:?}",
            config.log_format, valid_log_formats
        ));
    }

    if config.worker.check_interval_seconds == 0 {
        return Err("检测间隔不能为0".to_string());
    }

    if config.worker.request_timeout_seconds == 0 {
        return Err("请求超时时间不能为0".to_string());
    }

    if config.store.connect_attempts == 0 {
        return Err("存储连接尝试次数不能为0".to_string());
    }

    if config.store.retention_per_target == 0 {
        return Err("每个目标保留的记录条数不能为0".to_string());
    }

    if config.store.data_file.is_some() && config.store.flush_interval_seconds == 0 {
        return Err("快照写入间隔不能为0".to_string());
    }

    for target in &config.store.seed_targets {
        if !is_probe_url(target) {
            return Err(format!("预置目标的URL格式无效: {target}"));
        }
    }

    if let Some(ref webhook_url) = config.notification.webhook_url {
        if !is_probe_url(webhook_url) {
            return Err(format!("webhook URL格式无效: {webhook_url}"));
        }
    }

    if config.web.enabled {
        if config.web.port == 0 {
            return Err("无效的Web服务器端口: 0，端口不能为0".to_string());
        }

        if config.web.bind_address.is_empty() {
            return Err("Web服务器绑定地址不能为空".to_string());
        }

        if config.web.history_limit == 0 {
            return Err("历史记录展示条数不能为0".to_string());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = Config::default();

        assert_eq!(config.worker.check_interval(), Duration::from_secs(5));
        assert_eq!(config.worker.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.store.connect_attempts, 5);
        assert_eq!(config.store.connect_retry_delay(), Duration::from_secs(2));
        assert!(config.web.enabled);
        assert_eq!(config.web.port, 3000);
        assert_eq!(config.web.history_limit, 20);
        assert_eq!(config.web.static_dir, PathBuf::from("./web"));
        assert_eq!(config.log_format, "text");
        assert!(config.log_file.is_none());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();

        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_serialization() {
        let mut config: Config = toml::from_str("").unwrap();
        config.store.seed_targets = vec!["https://example.com".to_string()];
        config.store.data_file = Some(PathBuf::from("/var/lib/sentinel/data.json"));

        let serialized = toml::to_string(&config).expect("序列化失败");
        let deserialized: Config = toml::from_str(&serialized).expect("反序列化失败");

        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_config_validation_zero_interval() {
        let mut config: Config = toml::from_str("").unwrap();
        config.worker.check_interval_seconds = 0;

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("检测间隔"));
    }

    #[test]
    fn test_config_validation_invalid_seed_target() {
        let mut config: Config = toml::from_str("").unwrap();
        config.store.seed_targets = vec!["ftp://example.com".to_string()];

        let result = validate_config(&config);
        assert!(result.unwrap_err().contains("URL格式无效"));
    }

    #[test]
    fn test_config_validation_invalid_log_level() {
        let mut config: Config = toml::from_str("").unwrap();
        config.log_level = "verbose".to_string();

        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_format_settings() {
        let config: Config =
            toml::from_str("log_format = \"json\"\nlog_file = \"/var/log/sentinel.log\"\n").unwrap();
        assert_eq!(config.log_format, "json");
        assert_eq!(config.log_file, Some(PathBuf::from("/var/log/sentinel.log")));
        assert!(validate_config(&config).is_ok());

        let mut config = Config::default();
        config.log_format = "xml".to_string();
        assert!(validate_config(&config).unwrap_err().contains("日志格式"));
    }

    #[test]
    fn test_disabled_web_skips_web_validation() {
        let mut config: Config = toml::from_str("").unwrap();
        config.web.enabled = false;
        config.web.port = 0;

        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_is_probe_url() {
        assert!(is_probe_url("http://localhost:8080/health"));
        assert!(is_probe_url("https://example.com"));
        assert!(!is_probe_url("https://"));
        assert!(!is_probe_url("example.com"));
        assert!(!is_probe_url(""));
    }
}
