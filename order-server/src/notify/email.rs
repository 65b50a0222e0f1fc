//! Email Notifier
//!
//! 通过邮件服务商 HTTP API 发送纯文本邮件。
//! 自带独立超时 — 超时绝不回传到状态写入路径。

use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

use super::{NotificationSender, NotificationTemplate, NotifyError};
use crate::db::models::Order;

#[derive(Clone)]
pub struct EmailNotifier {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    from_address: String,
}

impl EmailNotifier {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        from_address: impl Into<String>,
        timeout_ms: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            from_address: from_address.into(),
        }
    }
}

/// 渲染纯文本邮件正文
fn render_body(template: NotificationTemplate, order: &Order) -> String {
    let mut body = String::new();

    match template {
        NotificationTemplate::OrderConfirmation => {
            body.push_str(&format!(
                "Hi {},\n\nThanks for your order! We've started preparing it.\n\n",
                order.customer.name
            ));
        }
        NotificationTemplate::StatusUpdate => {
            body.push_str(&format!(
                "Hi {},\n\nYour order is now: {}.\n\n",
                order.customer.name,
                order.status.as_str().replace('_', " ")
            ));
        }
    }

    body.push_str("Order summary:\n");
    for item in &order.items {
        body.push_str(&format!(
            "  {} x {} — {}\n",
            item.quantity, item.name, item.unit_price
        ));
    }
    body.push_str(&format!(
        "\nSubtotal: {}\nTax: {}\nTotal: {}\n",
        order.subtotal, order.tax, order.total
    ));

    if let Some(minutes) = order.estimated_minutes {
        body.push_str(&format!("\nEstimated ready in about {minutes} minutes.\n"));
    }

    body
}

#[async_trait]
impl NotificationSender for EmailNotifier {
    async fn send(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        order: &Order,
    ) -> Result<(), NotifyError> {
        let payload = json!({
            "from": self.from_address,
            "to": recipient,
            "subject": template.subject(order),
            "text": render_body(template, order),
        });

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    NotifyError::Timeout
                } else {
                    NotifyError::Api(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(NotifyError::Api(format!(
                "mail API returned {}",
                response.status()
            )));
        }

        Ok(())
    }
}
