//! HTTP Payment Gateway
//!
//! reqwest 实现 — 对接托管支付处理商的 REST API。
//! 金额按处理商要求转为最小货币单位 (cents)。

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

use super::{GatewayError, GatewayOrder, PaymentGateway, PaymentLink};
use crate::db::models::OrderItem;

#[derive(Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout_ms: u64) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .expect("reqwest client construction cannot fail with static options");

        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn map_err(e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout
        } else {
            GatewayError::Api(e.to_string())
        }
    }
}

/// Decimal → 最小货币单位 (2 位小数)
fn to_cents(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| GatewayError::Api(format!("amount {amount} out of range")))
}

#[derive(Deserialize)]
struct CaptureResponse {
    payment: PaymentBody,
}

#[derive(Deserialize)]
struct PaymentBody {
    id: String,
}

#[derive(Deserialize)]
struct PaymentLinkResponse {
    payment_link: PaymentLinkBody,
}

#[derive(Deserialize)]
struct PaymentLinkBody {
    url: String,
    order_id: String,
}

#[derive(Deserialize)]
struct RetrieveOrderResponse {
    order: GatewayOrder,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn capture(&self, token: &str, amount: Decimal) -> Result<String, GatewayError> {
        let body = json!({
            "source_token": token,
            "amount_money": { "amount": to_cents(amount)?, "currency": "USD" },
        });

        let response = self
            .client
            .post(format!("{}/v2/payments", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_err)?;

        let status = response.status();
        if status == reqwest::StatusCode::PAYMENT_REQUIRED
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            let detail = response.text().await.unwrap_or_default();
            return Err(GatewayError::Declined(detail));
        }
        if !status.is_success() {
            return Err(GatewayError::Api(format!("capture returned {status}")));
        }

        let parsed: CaptureResponse = response.json().await.map_err(Self::map_err)?;
        Ok(parsed.payment.id)
    }

    async fn create_payment_link(
        &self,
        local_order_id: &str,
        amount: Decimal,
        items: &[OrderItem],
    ) -> Result<PaymentLink, GatewayError> {
        let line_items: Vec<serde_json::Value> = items
            .iter()
            .map(|item| {
                Ok(json!({
                    "name": item.name,
                    "quantity": item.quantity.to_string(),
                    "base_price_money": {
                        "amount": to_cents(item.unit_price)?,
                        "currency": "USD",
                    },
                }))
            })
            .collect::<Result<_, GatewayError>>()?;

        let body = json!({
            "order": {
                // reference_id 回流到 webhook，关联本地订单
                "reference_id": local_order_id,
                "line_items": line_items,
                "total_money": { "amount": to_cents(amount)?, "currency": "USD" },
            },
        });

        let response = self
            .client
            .post(format!("{}/v2/payment-links", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(Self::map_err)?;

        if !response.status().is_success() {
            return Err(GatewayError::Api(format!(
                "payment link returned {}",
                response.status()
            )));
        }

        let parsed: PaymentLinkResponse = response.json().await.map_err(Self::map_err)?;
        Ok(PaymentLink {
            url: parsed.payment_link.url,
            gateway_order_id: parsed.payment_link.order_id,
        })
    }

    async fn retrieve_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<GatewayOrder>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/v2/orders/{gateway_order_id}", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(Self::map_err)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(GatewayError::Api(format!(
                "retrieve order returned {}",
                response.status()
            )));
        }

        let parsed: RetrieveOrderResponse = response.json().await.map_err(Self::map_err)?;
        Ok(Some(parsed.order))
    }
}
