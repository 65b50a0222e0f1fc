//! Webhook 处理流水线
//!
//! ```text
//! 原始请求体 → 签名验证 → 解析 → 类型过滤 → 去重 → 关联订单 → 状态机
//! ```
//!
//! # 响应约定
//!
//! 除签名失败 (401) 和不可恢复的内部错误 (500) 外一律 200 —
//! 本系统处理不了的事件（未知类型、未知订单）确认后忽略，
//! 避免处理商无限重试。
//!
//! # 幂等边界
//!
//! event_id 去重表 + 状态机的 CAS / no-op 守卫。去重行在副作用之前
//! 写入；副作用阶段出系统错误时删除该行，让处理商的重试有效。
//! 乱序容忍：webhook 与客户端回跳确认谁先到谁转换，后到者命中
//! no-op 路径。

use std::sync::Arc;

use serde::Deserialize;

use crate::db::models::{CustomerInfo, Order, OrderItem, OrderStatus, PaymentMethod};
use crate::db::repository::{OrderRepository, WebhookEventRepository};
use crate::gateway::{GatewayOrder, PaymentGateway, signature};
use crate::orders::StatusTransitionManager;
use crate::utils::{AppError, AppResult, now_millis};

/// 处理商事件类型中唯一驱动状态机的一种
const EVENT_PAYMENT_UPDATED: &str = "payment.updated";

/// 处理结果 — 三种都映射为 200
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// 事件驱动了一次状态转换（或订单回填 + 转换）
    Processed,
    /// 确认但忽略：未知类型、未支付完成、本系统无法关联的订单
    Ignored,
    /// 重复投递，副作用已在首次投递时完成
    AlreadyProcessed,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Processed => "processed",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::AlreadyProcessed => "duplicate",
        }
    }
}

// ========== 处理商 wire 格式 ==========

#[derive(Debug, Deserialize)]
struct WebhookEnvelope {
    #[serde(default)]
    event_id: Option<String>,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    object: WebhookObject,
}

#[derive(Debug, Deserialize)]
struct WebhookObject {
    payment: WebhookPayment,
}

#[derive(Debug, Deserialize)]
struct WebhookPayment {
    id: String,
    status: String,
    #[serde(default)]
    order_id: Option<String>,
}

pub struct WebhookIngestor {
    orders: OrderRepository,
    events: WebhookEventRepository,
    gateway: Arc<dyn PaymentGateway>,
    transitions: StatusTransitionManager,
    secret: Vec<u8>,
    verify_signatures: bool,
}

impl WebhookIngestor {
    /// `verify_signatures = false` 只允许测试/预发环境，必须是显式
    /// 配置值传入构造器（不做隐式环境判断），并在启动时高调记录。
    pub fn new(
        orders: OrderRepository,
        events: WebhookEventRepository,
        gateway: Arc<dyn PaymentGateway>,
        transitions: StatusTransitionManager,
        secret: impl Into<Vec<u8>>,
        verify_signatures: bool,
    ) -> Self {
        if !verify_signatures {
            tracing::warn!(
                "WEBHOOK SIGNATURE VERIFICATION IS DISABLED - never run production like this"
            );
        }
        Self {
            orders,
            events,
            gateway,
            transitions,
            secret: secret.into(),
            verify_signatures,
        }
    }

    /// 处理一次投递
    pub async fn process(
        &self,
        raw_body: &[u8],
        signature_header: Option<&str>,
    ) -> AppResult<WebhookOutcome> {
        // 1. 签名 — fail closed，验证失败零副作用
        if self.verify_signatures {
            let header = signature_header.ok_or(AppError::Unauthorized)?;
            if !signature::verify(&self.secret, raw_body, header) {
                tracing::warn!("Webhook signature mismatch, event dropped");
                return Err(AppError::Unauthorized);
            }
        } else {
            tracing::warn!("Webhook accepted WITHOUT signature verification (explicit bypass)");
        }

        // 2. 解析 — 签名已验真，格式不对是处理商侧问题，确认后忽略
        let envelope: WebhookEnvelope = match serde_json::from_slice(raw_body) {
            Ok(e) => e,
            Err(e) => {
                tracing::warn!(error = %e, "Unparseable webhook body, acknowledged and ignored");
                return Ok(WebhookOutcome::Ignored);
            }
        };

        // 3. 类型过滤 — 其他事件类型确认后忽略，从不报错
        if envelope.event_type != EVENT_PAYMENT_UPDATED {
            tracing::debug!(event_type = %envelope.event_type, "Unrecognized event type, ignored");
            return Ok(WebhookOutcome::Ignored);
        }

        let Some(payment) = envelope.data.map(|d| d.object.payment) else {
            tracing::warn!("payment.updated event without payment object, ignored");
            return Ok(WebhookOutcome::Ignored);
        };

        if !payment.status.eq_ignore_ascii_case("COMPLETED") {
            tracing::debug!(
                payment_id = %payment.id,
                status = %payment.status,
                "Payment not completed yet, ignored"
            );
            return Ok(WebhookOutcome::Ignored);
        }

        // 4. 去重 — event_id 缺失时退化为 gateway_order_id + 目标状态
        let dedup_key = envelope.event_id.clone().unwrap_or_else(|| {
            format!(
                "{}:{}",
                payment.order_id.as_deref().unwrap_or(&payment.id),
                OrderStatus::Preparing.as_str()
            )
        });

        let first_delivery = self
            .events
            .record(&dedup_key, payment.order_id.as_deref())
            .await?;
        if !first_delivery {
            tracing::debug!(event_id = %dedup_key, "Duplicate webhook delivery, skipped");
            return Ok(WebhookOutcome::AlreadyProcessed);
        }

        // 5. 副作用阶段 — 系统错误时补偿去重行再上抛 (500 → 处理商重试)
        match self.apply(&payment).await {
            Ok(outcome) => Ok(outcome),
            Err(e @ (AppError::Database(_) | AppError::Internal(_))) => {
                self.events.remove(&dedup_key).await?;
                Err(e)
            }
            Err(other) => Err(other),
        }
    }

    /// 关联订单并驱动状态机
    async fn apply(&self, payment: &WebhookPayment) -> AppResult<WebhookOutcome> {
        // 先按网关订单 id 关联 (redirect 流程)，再按 charge id (direct 流程)
        let mut order = match &payment.order_id {
            Some(gateway_order_id) => {
                self.orders
                    .find_by_payment_reference(gateway_order_id)
                    .await?
            }
            None => None,
        };
        if order.is_none() {
            order = self.orders.find_by_payment_reference(&payment.id).await?;
        }

        // 本地无此订单：redirect 流程可能没有事先落库，向网关要详情回填
        let order = match order {
            Some(order) => order,
            None => {
                let Some(gateway_order_id) = &payment.order_id else {
                    tracing::warn!(
                        payment_id = %payment.id,
                        "Webhook for unknown payment without order id, ignored (needs manual review)"
                    );
                    return Ok(WebhookOutcome::Ignored);
                };
                match self.backfill_order(gateway_order_id).await? {
                    Some(order) => order,
                    None => {
                        tracing::warn!(
                            gateway_order_id = %gateway_order_id,
                            payment_id = %payment.id,
                            "Webhook for order unknown to us and to the gateway, ignored (needs manual review)"
                        );
                        return Ok(WebhookOutcome::Ignored);
                    }
                }
            }
        };

        match self
            .transitions
            .transition(&order.id, OrderStatus::Preparing, "webhook", None)
            .await
        {
            Ok(_) => Ok(WebhookOutcome::Processed),
            // 订单已越过 preparing（后厨先动了）或已终态 — 迟到事件，确认忽略
            Err(AppError::InvalidTransition(reason)) => {
                tracing::warn!(
                    order_id = %order.id,
                    reason = %reason,
                    "Late payment webhook could not transition order, ignored"
                );
                Ok(WebhookOutcome::Ignored)
            }
            Err(e) => Err(e),
        }
    }

    /// 从网关详情物化本地订单 (状态 pending_payment，随后正常转换)
    async fn backfill_order(&self, gateway_order_id: &str) -> AppResult<Option<Order>> {
        let detail = self
            .gateway
            .retrieve_order(gateway_order_id)
            .await
            .map_err(|e| AppError::internal(format!("gateway retrieve failed: {e}")))?;

        let Some(detail) = detail else {
            return Ok(None);
        };

        let order = materialize(gateway_order_id, detail);
        self.orders.create(&order).await?;

        tracing::info!(
            order_id = %order.id,
            gateway_order_id = %gateway_order_id,
            "Materialized local order from gateway detail"
        );

        Ok(Some(order))
    }
}

fn materialize(gateway_order_id: &str, detail: GatewayOrder) -> Order {
    let now = now_millis();
    Order {
        id: uuid::Uuid::new_v4().to_string(),
        location: detail.location.unwrap_or_else(|| "unknown".to_string()),
        items: if detail.items.is_empty() {
            // 网关没给行项目时保留一条占位，订单仍可走完生命周期
            vec![OrderItem {
                name: "Online order".to_string(),
                quantity: 1,
                unit_price: detail.total,
                special_instructions: None,
            }]
        } else {
            detail.items
        },
        customer: CustomerInfo {
            name: detail.customer_name.unwrap_or_default(),
            email: detail.customer_email.unwrap_or_default(),
            phone: detail.customer_phone.unwrap_or_default(),
            special_instructions: None,
        },
        subtotal: detail.total,
        tax: rust_decimal::Decimal::ZERO,
        total: detail.total,
        payment_method: PaymentMethod::OnlineRedirect,
        payment_reference: Some(gateway_order_id.to_string()),
        status: OrderStatus::PendingPayment,
        estimated_minutes: None,
        created_at: now,
        updated_at: now,
    }
}
