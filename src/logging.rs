//! 日志系统模块
//!
//! 基于 tracing 的结构化日志配置，`log` crate 的记录通过 LogTracer 桥接过来

use crate::config::Config;
use log::LevelFilter;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, OnceLock};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter, Layer};

/// 全局日志初始化状态
#[derive(Debug, Default)]
struct GlobalLoggingState {
    /// 是否已初始化
    initialized: bool,
    /// 初始化失败时的错误信息
    init_error: Option<String>,
    /// 当前配置
    current_config: Option<LogConfig>,
}

/// 全局日志状态管理器
static GLOBAL_LOGGING_STATE: OnceLock<Mutex<GlobalLoggingState>> = OnceLock::new();

/// 日志配置结构
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// 日志级别
    pub level: LevelFilter,
    /// 日志文件路径，不设置时输出到标准输出
    pub file_path: Option<PathBuf>,
    /// 是否使用JSON格式
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LevelFilter::Info,
            file_path: None,
            json_format: false,
        }
    }
}

impl LogConfig {
    /// 根据级别字符串创建配置，无法识别的级别回退到 info
    pub fn with_level(level: &str) -> Self {
        Self {
            level: LevelFilter::from_str(level).unwrap_or(LevelFilter::Info),
            ..Self::default()
        }
    }

    /// 合并命令行级别和配置文件中的日志设置
    ///
    /// 命令行级别优先；配置文件加载失败时传入 `None`，使用默认设置
    pub fn resolve(level_override: Option<LevelFilter>, config: Option<&Config>) -> Self {
        let mut log_config = match config {
            Some(config) => Self {
                file_path: config.log_file.clone(),
                json_format: config.log_format == "json",
                ..Self::with_level(&config.log_level)
            },
            None => Self::default(),
        };
        if let Some(level) = level_override {
            log_config.level = level;
        }
        log_config
    }
}

/// 日志系统管理器
#[derive(Debug)]
pub struct LoggingSystem {
    config: LogConfig,
}

impl LoggingSystem {
    /// 初始化日志系统
    ///
    /// 进程内只会真正初始化一次，之后的调用直接返回
    ///
    /// # 参数
    /// * `config` - 日志配置
    ///
    /// # 返回
    /// * `anyhow::Result<LoggingSystem>` - 初始化结果
    pub fn setup_logging(config: LogConfig) -> anyhow::Result<Self> {
        let mut state = lock_state();

        if state.initialized {
            return match &state.init_error {
                None => Ok(Self { config }),
                Some(e) => Err(anyhow::anyhow!("日志系统之前初始化失败: {}", e)),
            };
        }

        let init_result = Self::perform_initialization(&config);

        state.initialized = true;
        state.current_config = Some(config.clone());
        state.init_error = init_result.as_ref().err().map(|e| e.to_string());

        init_result.map(|()| Self { config })
    }

    /// 当前实例使用的配置
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// 执行实际的日志系统初始化
    fn perform_initialization(config: &LogConfig) -> anyhow::Result<()> {
        Self::init_log_tracer()?;
        Self::init_tracing_subscriber(config)
    }

    /// 初始化 LogTracer（log crate 到 tracing 的桥接）
    fn init_log_tracer() -> anyhow::Result<()> {
        use tracing_log::LogTracer;

        static LOG_TRACER_INIT: OnceLock<Result<(), String>> = OnceLock::new();

        let result = LOG_TRACER_INIT.get_or_init(|| LogTracer::init().map_err(|e| e.to_string()));

        result
            .as_ref()
            .map_err(|e| anyhow::anyhow!("LogTracer初始化失败: {}", e))?;
        Ok(())
    }

    /// 初始化 tracing subscriber
    fn init_tracing_subscriber(config: &LogConfig) -> anyhow::Result<()> {
        let env_filter =
            EnvFilter::from_default_env().add_directive(Self::convert_level_to_directive(config.level));

        let fmt_layer = match &config.file_path {
            Some(file_path) => {
                let file = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(file_path)
                    .map_err(|e| anyhow::anyhow!("打开日志文件失败 {}: {}", file_path.display(), e))?;
                if config.json_format {
                    fmt::layer()
                        .json()
                        .with_writer(file)
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_current_span(false)
                        .boxed()
                } else {
                    fmt::layer()
                        .with_writer(file)
                        .with_ansi(false)
                        .with_timer(fmt::time::ChronoUtc::rfc_3339())
                        .with_target(true)
                        .boxed()
                }
            }
            None if config.json_format => fmt::layer()
                .json()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_current_span(false)
                .boxed(),
            None => fmt::layer()
                .with_timer(fmt::time::ChronoUtc::rfc_3339())
                .with_ansi(true)
                .with_target(true)
                .boxed(),
        };

        let result = registry().with(env_filter).with(fmt_layer).try_init();

        match result {
            Ok(()) => {
                tracing::debug!("日志系统初始化完成: {:?}", config);
                Ok(())
            }
            Err(e) => {
                let error_msg = e.to_string();
                // 其他组件（例如测试框架）已经设置过全局 subscriber
                if error_msg.contains("already been set")
                    || error_msg.contains("already initialized")
                {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("tracing subscriber初始化失败: {}", error_msg))
                }
            }
        }
    }

    /// 将 log::LevelFilter 转换为 tracing 的指令
    fn convert_level_to_directive(level: LevelFilter) -> Directive {
        use tracing_subscriber::filter::LevelFilter as TracingLevel;
        let level = match level {
            LevelFilter::Off => TracingLevel::OFF,
            LevelFilter::Error => TracingLevel::ERROR,
            LevelFilter::Warn => TracingLevel::WARN,
            LevelFilter::Info => TracingLevel::INFO,
            LevelFilter::Debug => TracingLevel::DEBUG,
            LevelFilter::Trace => TracingLevel::TRACE,
        };
        Directive::from(level)
    }

    /// 检查日志系统是否已初始化
    pub fn is_initialized() -> bool {
        lock_state().initialized
    }

    /// 获取当前日志配置（如果已初始化）
    pub fn current_config() -> Option<LogConfig> {
        lock_state().current_config.clone()
    }
}

fn lock_state() -> MutexGuard<'static, GlobalLoggingState> {
    GLOBAL_LOGGING_STATE
        .get_or_init(|| Mutex::new(GlobalLoggingState::default()))
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_with_level_parses_known_levels() {
        assert_eq!(LogConfig::with_level("debug").level, LevelFilter::Debug);
        assert_eq!(LogConfig::with_level("WARN").level, LevelFilter::Warn);
        assert_eq!(LogConfig::with_level("nonsense").level, LevelFilter::Info);
    }

    #[test]
    fn test_resolve_from_app_config() {
        let mut app_config = Config::default();
        app_config.log_level = "warn".to_string();
        app_config.log_format = "json".to_string();
        app_config.log_file = Some(PathBuf::from("/tmp/sentinel.log"));

        let resolved = LogConfig::resolve(None, Some(&app_config));
        assert_eq!(resolved.level, LevelFilter::Warn);
        assert!(resolved.json_format);
        assert_eq!(resolved.file_path, Some(PathBuf::from("/tmp/sentinel.log")));

        // 命令行级别覆盖配置文件，其它设置保留
        let overridden = LogConfig::resolve(Some(LevelFilter::Trace), Some(&app_config));
        assert_eq!(overridden.level, LevelFilter::Trace);
        assert!(overridden.json_format);
    }

    #[test]
    fn test_resolve_without_app_config() {
        let resolved = LogConfig::resolve(None, None);
        assert_eq!(resolved.level, LevelFilter::Info);
        assert!(!resolved.json_format);
        assert!(resolved.file_path.is_none());

        let resolved = LogConfig::resolve(Some(LevelFilter::Debug), None);
        assert_eq!(resolved.level, LevelFilter::Debug);
    }

    #[test]
    #[serial]
    fn test_logging_system_single_initialization() {
        let config = LogConfig::with_level("debug");

        let first = LoggingSystem::setup_logging(config.clone());
        assert!(first.is_ok());
        assert!(LoggingSystem::is_initialized());

        // 再次调用不会重复初始化
        let second = LoggingSystem::setup_logging(LogConfig {
            json_format: true,
            ..config
        });
        assert!(second.is_ok());
        assert!(second.unwrap().config().json_format);

        let current = LoggingSystem::current_config().unwrap();
        assert_eq!(current.level, LevelFilter::Debug);
        assert!(!current.json_format);
    }

    #[test]
    fn test_level_directive_conversion() {
        let directive = LoggingSystem::convert_level_to_directive(LevelFilter::Warn);
        assert_eq!(directive.to_string(), "warn");

        let off = LoggingSystem::convert_level_to_directive(LevelFilter::Off);
        assert_eq!(off.to_string(), "off");
    }
}
