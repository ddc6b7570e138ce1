//! Webhook 通知发送器模块
//!
//! 以 JSON POST 的方式把告警事件推送到外部系统

use crate::error::{NotificationError, Result, SentinelError};
use crate::health::AlertTransition;
use crate::notification::sender::AlertNotifier;
use crate::notification::template::MessageTemplates;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, error, info};

/// Webhook 请求超时时间
const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

/// Webhook 通知发送器
pub struct WebhookNotifier {
    /// HTTP客户端
    client: Client,
    /// webhook URL
    webhook_url: String,
    /// 消息模板
    templates: MessageTemplates,
}

impl WebhookNotifier {
    /// 创建新的 webhook 发送器
    ///
    /// # 参数
    /// * `webhook_url` - webhook URL
    /// * `templates` - 消息模板
    ///
    /// # 返回
    /// * `Result<Self>` - 发送器实例
    pub fn new(webhook_url: impl Into<String>, templates: MessageTemplates) -> Result<Self> {
        let client = Client::builder()
            .timeout(WEBHOOK_TIMEOUT)
            .user_agent(format!("{}/{}", crate::APP_NAME, crate::VERSION))
            .build()
            .map_err(|e| NotificationError::ConfigError(format!("创建HTTP客户端失败: {e}")))?;

        Ok(Self {
            client,
            webhook_url: webhook_url.into(),
            templates,
        })
    }

    /// 构建消息体
    fn build_message_body(&self, transition: &AlertTransition) -> Result<Value> {
        let message = self.templates.render(transition)?;

        Ok(json!({
            "id": transition.id,
            "url": transition.url,
            "kind": transition.kind,
            "consecutive_failures": transition.consecutive_failures,
            "status_code": transition.status_code,
            "occurred_at": transition.occurred_at,
            "message": message,
        }))
    }

    /// 发送消息到 webhook
    async fn send_to_webhook(&self, body: &Value) -> Result<()> {
        debug!("发送消息到webhook: {}", self.webhook_url);

        let response = self
            .client
            .post(&self.webhook_url)
            .json(body)
            .send()
            .await
            .map_err(|e| NotificationError::SendError(format!("请求webhook失败: {e}")))?;

        if response.status().is_success() {
            info!("webhook消息发送成功");
            Ok(())
        } else {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            error!("webhook消息发送失败: {} - {}", status, text);
            Err(SentinelError::from(NotificationError::SendError(format!(
                "webhook返回状态码 {status}"
            ))))
        }
    }
}

#[async_trait]
impl AlertNotifier for WebhookNotifier {
    async fn notify(&self, transition: &AlertTransition) -> Result<()> {
        let body = self.build_message_body(transition)?;
        self.send_to_webhook(&body).await
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
