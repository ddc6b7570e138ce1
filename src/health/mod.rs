//! 健康检测模块
//!
//! 提供HTTP探测、并发执行、告警状态机和检测调度功能

pub mod alert;
pub mod executor;
pub mod prober;
pub mod result;
pub mod scheduler;

// 重新导出主要类型
pub use alert::{AlertKind, AlertState, AlertStateMachine, AlertTransition, FailureStreak, FAILURE_THRESHOLD};
pub use prober::{HttpProber, Prober, DEFAULT_PROBE_TIMEOUT};
pub use result::ProbeOutcome;
pub use scheduler::{Scheduler, SchedulerStats, TickReport, DEFAULT_CHECK_INTERVAL};
