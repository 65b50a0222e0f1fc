//! Order Intake Service
//!
//! 校验并持久化新订单，决定支付路径，返回客户端可用的支付句柄。
//!
//! # 支付路径
//!
//! | 方式 | 流程 | 落库状态 |
//! |------|------|----------|
//! | in_store | 无网关调用，直接进 preparing | preparing |
//! | online_direct | 同步 capture 卡 token | preparing / payment_failed |
//! | online_redirect | 创建托管支付链接，等 webhook | pending_payment |
//!
//! 全部校验发生在任何持久化或外部调用之前 (`ValidationError` 先行)。
//! 同步扣款失败时订单保留（payment_failed），不回滚 — 供人工对账。

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::{CustomerInfo, Order, OrderItem, OrderStatus, PaymentMethod};
use crate::db::repository::OrderRepository;
use crate::gateway::{GatewayError, PaymentGateway};
use crate::orders::StatusTransitionManager;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_NOTE_LEN, MAX_SHORT_TEXT_LEN, validate_email, validate_optional_text,
    validate_required_text,
};
use crate::utils::{AppError, AppResult, now_millis};

/// total 与 subtotal + tax 允许的最大偏差 (0.01 — 一分钱的浮点/舍入余量)
fn money_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

/// 创建订单请求
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderRequest {
    pub location: String,
    pub items: Vec<CreateOrderItem>,
    pub customer: CreateOrderCustomer,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    /// 预先获取的卡 token (online_direct 必填)
    #[serde(default)]
    pub card_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderItem {
    pub name: String,
    pub quantity: u32,
    pub unit_price: Decimal,
    /// 行项目门店 — 缺省继承订单门店，出现则必须一致
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default)]
    pub special_instructions: Option<String>,
}

/// 创建结果 — 201 响应体
#[derive(Debug, Clone, Serialize)]
pub struct IntakeOutcome {
    pub order_id: String,
    pub status: OrderStatus,
    /// 托管支付跳转 URL (online_redirect)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

#[derive(Clone)]
pub struct OrderIntakeService {
    repo: OrderRepository,
    gateway: Arc<dyn PaymentGateway>,
    transitions: StatusTransitionManager,
}

impl OrderIntakeService {
    pub fn new(
        repo: OrderRepository,
        gateway: Arc<dyn PaymentGateway>,
        transitions: StatusTransitionManager,
    ) -> Self {
        Self {
            repo,
            gateway,
            transitions,
        }
    }

    /// 创建订单
    pub async fn create(&self, request: CreateOrderRequest) -> AppResult<IntakeOutcome> {
        validate_request(&request)?;

        let now = now_millis();
        let order = Order {
            id: Uuid::new_v4().to_string(),
            location: request.location.clone(),
            items: request
                .items
                .iter()
                .map(|item| OrderItem {
                    name: item.name.clone(),
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    special_instructions: item.special_instructions.clone(),
                })
                .collect(),
            customer: CustomerInfo {
                name: request.customer.name.clone(),
                email: request.customer.email.clone(),
                phone: request.customer.phone.clone(),
                special_instructions: request.customer.special_instructions.clone(),
            },
            subtotal: request.subtotal,
            tax: request.tax,
            total: request.total,
            payment_method: request.payment_method,
            payment_reference: None,
            status: OrderStatus::PendingPayment,
            estimated_minutes: None,
            created_at: now,
            updated_at: now,
        };

        self.repo.create(&order).await?;

        match request.payment_method {
            PaymentMethod::InStore => self.finish_synchronous(&order.id).await,
            PaymentMethod::OnlineDirect => {
                // card_token 在 validate_request 中已确认存在
                let token = request.card_token.as_deref().unwrap_or_default();
                self.capture_and_finish(&order.id, token, order.total).await
            }
            PaymentMethod::OnlineRedirect => self.create_redirect(&order).await,
        }
    }

    /// in_store / capture 成功后的同步收尾：
    /// 通过状态机进入 preparing，走与 webhook 相同的通知路径（恰好一次）。
    async fn finish_synchronous(&self, order_id: &str) -> AppResult<IntakeOutcome> {
        let order = self
            .transitions
            .transition(order_id, OrderStatus::Preparing, "checkout", None)
            .await?;

        Ok(IntakeOutcome {
            order_id: order.id,
            status: order.status,
            redirect_url: None,
        })
    }

    async fn capture_and_finish(
        &self,
        order_id: &str,
        token: &str,
        amount: Decimal,
    ) -> AppResult<IntakeOutcome> {
        match self.gateway.capture(token, amount).await {
            Ok(payment_ref) => {
                self.repo.set_payment_reference(order_id, &payment_ref).await?;
                self.finish_synchronous(order_id).await
            }
            Err(GatewayError::Timeout) => {
                // 结果未知：订单留在 pending_payment，webhook 仍可事后确认
                tracing::warn!(
                    order_id = %order_id,
                    "Gateway capture timed out, order left in pending_payment"
                );
                Err(AppError::payment(
                    "payment could not be confirmed, please retry checkout",
                ))
            }
            Err(e) => {
                // 网关明确失败：订单保留在 payment_failed 供人工对账
                tracing::warn!(order_id = %order_id, error = %e, "Gateway capture failed");
                self.repo
                    .cas_status(
                        order_id,
                        OrderStatus::PendingPayment,
                        OrderStatus::PaymentFailed,
                        None,
                    )
                    .await?;
                Err(AppError::payment(e.to_string()))
            }
        }
    }

    async fn create_redirect(&self, order: &Order) -> AppResult<IntakeOutcome> {
        match self
            .gateway
            .create_payment_link(&order.id, order.total, &order.items)
            .await
        {
            Ok(link) => {
                // 网关订单 id 即 webhook 关联键
                self.repo
                    .set_payment_reference(&order.id, &link.gateway_order_id)
                    .await?;

                Ok(IntakeOutcome {
                    order_id: order.id.clone(),
                    status: OrderStatus::PendingPayment,
                    redirect_url: Some(link.url),
                })
            }
            Err(GatewayError::Timeout) => {
                tracing::warn!(
                    order_id = %order.id,
                    "Payment link creation timed out, order left in pending_payment"
                );
                Err(AppError::payment(
                    "payment could not be initiated, please retry checkout",
                ))
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Payment link creation failed");
                self.repo
                    .cas_status(
                        &order.id,
                        OrderStatus::PendingPayment,
                        OrderStatus::PaymentFailed,
                        None,
                    )
                    .await?;
                Err(AppError::payment(e.to_string()))
            }
        }
    }
}

/// 请求校验 — 任何持久化或外部调用之前
fn validate_request(request: &CreateOrderRequest) -> AppResult<()> {
    if request.items.is_empty() {
        return Err(AppError::validation("order must contain at least one item"));
    }

    validate_required_text(&request.location, "location", MAX_SHORT_TEXT_LEN)?;

    for (index, item) in request.items.iter().enumerate() {
        validate_required_text(&item.name, &format!("items[{index}].name"), MAX_NAME_LEN)?;
        if item.quantity == 0 {
            return Err(AppError::validation(format!(
                "items[{index}].quantity must be positive"
            )));
        }
        if item.unit_price < Decimal::ZERO {
            return Err(AppError::validation(format!(
                "items[{index}].unit_price must not be negative"
            )));
        }
        if let Some(item_location) = &item.location
            && item_location != &request.location
        {
            return Err(AppError::validation(format!(
                "items[{index}] belongs to location '{item_location}', order is for '{}'",
                request.location
            )));
        }
        validate_optional_text(
            &item.special_instructions,
            &format!("items[{index}].special_instructions"),
            MAX_NOTE_LEN,
        )?;
    }

    // total = subtotal + tax (± epsilon)
    if request.subtotal < Decimal::ZERO || request.tax < Decimal::ZERO {
        return Err(AppError::validation("subtotal and tax must not be negative"));
    }
    let drift = (request.subtotal + request.tax - request.total).abs();
    if drift > money_epsilon() {
        return Err(AppError::validation(format!(
            "total {} does not equal subtotal {} + tax {}",
            request.total, request.subtotal, request.tax
        )));
    }

    validate_required_text(&request.customer.name, "customer.name", MAX_NAME_LEN)?;
    validate_required_text(&request.customer.phone, "customer.phone", MAX_SHORT_TEXT_LEN)?;
    // email 是通知路径必需字段，所有支付方式都会发确认邮件
    validate_email(&request.customer.email, "customer.email")?;
    validate_optional_text(
        &request.customer.special_instructions,
        "customer.special_instructions",
        MAX_NOTE_LEN,
    )?;

    if request.payment_method == PaymentMethod::OnlineDirect
        && request.card_token.as_deref().is_none_or(str::is_empty)
    {
        return Err(AppError::validation(
            "card_token is required for online_direct payment",
        ));
    }

    Ok(())
}
