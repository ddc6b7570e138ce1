//! 通知模块
//!
//! 提供告警事件的日志、webhook通知和消息模板功能

pub mod sender;
pub mod template;
pub mod webhook;

// 重新导出主要类型
pub use sender::{AlertNotifier, CompositeNotifier, LogNotifier, NoOpNotifier};
pub use template::MessageTemplates;
pub use webhook::WebhookNotifier;
