//! 通知发送器模块
//!
//! 定义告警事件通知的trait和基础实现

use crate::error::{NotificationError, Result};
use crate::health::{AlertKind, AlertTransition};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// 告警通知trait
///
/// 每个状态切换事件只尝试发送一次，不重试，也不要求确认。
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    /// 发送告警状态切换事件
    ///
    /// # 参数
    /// * `transition` - 状态切换事件
    ///
    /// # 返回
    /// * `Result<()>` - 发送结果
    async fn notify(&self, transition: &AlertTransition) -> Result<()>;

    /// 通知渠道名称，用于日志
    fn name(&self) -> &str;
}

/// 日志通知器，默认渠道
pub struct LogNotifier;

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, transition: &AlertTransition) -> Result<()> {
        match transition.kind {
            AlertKind::Fired => warn!(
                url = %transition.url,
                consecutive_failures = transition.consecutive_failures,
                status_code = transition.status_code,
                "🚨 告警: 目标连续失败 {} 次",
                transition.consecutive_failures
            ),
            AlertKind::Recovered => info!(
                url = %transition.url,
                status_code = transition.status_code,
                "💚 恢复: 目标已恢复正常"
            ),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// 空的通知器实现（用于测试或禁用通知）
pub struct NoOpNotifier;

#[async_trait]
impl AlertNotifier for NoOpNotifier {
    async fn notify(&self, _transition: &AlertTransition) -> Result<()> {
        // 不执行任何操作
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// 组合通知器，把同一事件依次发给多个渠道
///
/// 某个渠道失败不影响其它渠道，所有失败汇总后返回。
pub struct CompositeNotifier {
    notifiers: Vec<Arc<dyn AlertNotifier>>,
}

impl CompositeNotifier {
    /// 创建组合通知器
    pub fn new(notifiers: Vec<Arc<dyn AlertNotifier>>) -> Self {
        Self { notifiers }
    }

    /// 渠道数量
    pub fn len(&self) -> usize {
        self.notifiers.len()
    }

    /// 是否没有任何渠道
    pub fn is_empty(&self) -> bool {
        self.notifiers.is_empty()
    }
}

#[async_trait]
impl AlertNotifier for CompositeNotifier {
    async fn notify(&self, transition: &AlertTransition) -> Result<()> {
        let mut failures = Vec::new();

        for notifier in &self.notifiers {
            if let Err(e) = notifier.notify(transition).await {
                failures.push(format!("{}: {}", notifier.name(), e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::SendError(failures.join("; ")).into())
        }
    }

    fn name(&self) -> &str {
        "composite"
    }
}
