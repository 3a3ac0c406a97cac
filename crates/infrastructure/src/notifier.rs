use async_trait::async_trait;
use helpdesk_core::{HelpdeskError, HelpdeskResult, Notifier};
use serde_json::json;
use tracing::{debug, error, info};

/// 只写日志的通知通道，未配置外部通道时使用
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(
        &self,
        recipient_id: &str,
        ticket_id: Option<i64>,
        template: &str,
    ) -> HelpdeskResult<()> {
        info!(
            recipient = recipient_id,
            ticket_id = ?ticket_id,
            "发送通知: {}",
            template
        );
        Ok(())
    }

    fn name(&self) -> &str {
        "log"
    }
}

/// 以 HTTP POST 投递通知的 Webhook 通道
pub struct WebhookNotifier {
    webhook_url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(webhook_url: impl Into<String>) -> Self {
        Self {
            webhook_url: webhook_url.into(),
            http_client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(
        &self,
        recipient_id: &str,
        ticket_id: Option<i64>,
        template: &str,
    ) -> HelpdeskResult<()> {
        let payload = json!({
            "recipient_id": recipient_id,
            "ticket_id": ticket_id,
            "message": template,
        });

        match self
            .http_client
            .post(&self.webhook_url)
            .json(&payload)
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                debug!("Webhook通知发送成功: recipient={}", recipient_id);
                Ok(())
            }
            Ok(response) => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                error!("Webhook通知发送失败: HTTP {} - {}", status, body);
                Err(HelpdeskError::external(format!(
                    "Webhook返回错误: HTTP {status} - {body}"
                )))
            }
            Err(e) => {
                error!("连接Webhook失败: {}", e);
                Err(HelpdeskError::external(format!("Webhook连接错误: {e}")))
            }
        }
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
