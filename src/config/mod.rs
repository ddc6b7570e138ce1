//! 配置管理模块
//!
//! 提供配置文件解析、环境变量覆盖和验证功能

pub mod loader;
pub mod types;

// 重新导出主要类型
pub use loader::{get_default_config_path, ConfigLoader, TomlConfigLoader, DEFAULT_CONFIG_TEMPLATE};
pub use types::{
    is_probe_url, validate_config, Config, NotificationConfig, StoreConfig, WebConfig,
    WorkerConfig,
};
