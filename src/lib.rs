//! Sentinel - HTTP 可用性监控工具
//!
//! 按固定间隔并发探测一组URL，记录每次探测结果，
//! 目标连续失败达到阈值时告警，恢复后发出恢复通知。

pub mod cli;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod notification;
pub mod store;
pub mod web;

// 重新导出主要类型
pub use config::Config;
pub use error::SentinelError;
pub use health::{AlertStateMachine, AlertTransition, ProbeOutcome, Prober, Scheduler};
pub use store::{MemoryStore, ResultSink, TargetStore};

/// 应用程序版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 应用程序名称
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// 应用程序描述
pub const APP_DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
