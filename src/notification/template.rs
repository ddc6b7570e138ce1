//! 消息模板模块
//!
//! 基于 handlebars 渲染告警与恢复消息

use crate::error::{NotificationError, Result};
use crate::health::{AlertKind, AlertTransition};
use handlebars::Handlebars;
use serde::Serialize;

const ALERT_TEMPLATE: &str = "alert";
const RECOVERY_TEMPLATE: &str = "recovery";

/// 模板上下文数据
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    /// 目标URL
    pub url: String,
    /// 连续失败次数
    pub consecutive_failures: u32,
    /// HTTP状态码，传输层失败时为空
    pub status_code: Option<u16>,
    /// 时间戳
    pub timestamp: String,
}

impl From<&AlertTransition> for TemplateContext {
    fn from(transition: &AlertTransition) -> Self {
        Self {
            url: transition.url.clone(),
            consecutive_failures: transition.consecutive_failures,
            status_code: (transition.status_code != 0).then_some(transition.status_code),
            timestamp: transition
                .occurred_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        }
    }
}

/// 告警消息模板
pub struct MessageTemplates {
    registry: Handlebars<'static>,
}

impl MessageTemplates {
    /// 使用给定的模板字符串创建，未提供的使用默认模板
    ///
    /// # 参数
    /// * `alert` - 告警模板
    /// * `recovery` - 恢复模板
    ///
    /// # 返回
    /// * `Result<Self>` - 模板语法错误时返回错误
    pub fn new(alert: Option<&str>, recovery: Option<&str>) -> Result<Self> {
        let mut registry = Handlebars::new();
        // 输出是纯文本，不做HTML转义
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);

        registry
            .register_template_string(ALERT_TEMPLATE, alert.unwrap_or(DEFAULT_ALERT_TEMPLATE))
            .map_err(|e| NotificationError::TemplateError(format!("告警模板无效: {e}")))?;
        registry
            .register_template_string(
                RECOVERY_TEMPLATE,
                recovery.unwrap_or(DEFAULT_RECOVERY_TEMPLATE),
            )
            .map_err(|e| NotificationError::TemplateError(format!("恢复模板无效: {e}")))?;

        Ok(Self { registry })
    }

    /// 渲染事件消息
    pub fn render(&self, transition: &AlertTransition) -> Result<String> {
        let name = match transition.kind {
            AlertKind::Fired => ALERT_TEMPLATE,
            AlertKind::Recovered => RECOVERY_TEMPLATE,
        };

        self.registry
            .render(name, &TemplateContext::from(transition))
            .map_err(|e| NotificationError::TemplateError(e.to_string()).into())
    }
}

/// 默认的告警消息模板
pub const DEFAULT_ALERT_TEMPLATE: &str = r#"🚨 目标告警: {{url}}
- 连续失败: {{consecutive_failures}} 次
- 状态码: {{#if status_code}}{{status_code}}{{else}}无响应{{/if}}
- 检测时间: {{timestamp}}"#;

/// 默认的恢复消息模板
pub const DEFAULT_RECOVERY_TEMPLATE: &str = r#"✅ 目标恢复: {{url}}
- 恢复前连续失败: {{consecutive_failures}} 次
- 恢复时间: {{timestamp}}"#;
