//! Order 数据模型
//!
//! 订单是系统唯一的可变共享资源。状态只能通过
//! [`StatusTransitionManager`](crate::orders::StatusTransitionManager) 变更，
//! 订单从不删除（历史/审计保留）。
//!
//! 金额使用 [`rust_decimal::Decimal`]，数据库存储为 TEXT；
//! 时间戳为 `i64` Unix millis。

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::utils::AppError;

/// 订单行项目
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub name: String,
    /// 数量，创建时校验 > 0
    pub quantity: u32,
    /// 单价，创建时校验 >= 0
    pub unit_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// 客户信息
///
/// email 为通知路径必需字段（确认邮件、状态变更邮件）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_instructions: Option<String>,
}

/// 支付方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// 到店支付 — 同步流程，无网关调用
    InStore,
    /// 卡 token 直接扣款 — 同步网关调用
    OnlineDirect,
    /// 托管支付链接 — 异步，webhook / 回跳确认
    OnlineRedirect,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::InStore => "in_store",
            PaymentMethod::OnlineDirect => "online_direct",
            PaymentMethod::OnlineRedirect => "online_redirect",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "in_store" => Some(PaymentMethod::InStore),
            "online_direct" => Some(PaymentMethod::OnlineDirect),
            "online_redirect" => Some(PaymentMethod::OnlineRedirect),
            _ => None,
        }
    }
}

/// 订单状态
///
/// # 状态机
///
/// ```text
/// pending_payment → preparing → in_progress → ready → completed
///        │              │            │          │
///        ├→ payment_failed (终态)    │          │
///        └──────────────┴────────────┴──────────┴→ cancelled (终态)
/// ```
///
/// 转换表见 [`OrderStatus::allowed_targets`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    PendingPayment,
    Preparing,
    InProgress,
    Ready,
    Completed,
    Cancelled,
    PaymentFailed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PendingPayment => "pending_payment",
            OrderStatus::Preparing => "preparing",
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Ready => "ready",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PaymentFailed => "payment_failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_payment" => Some(OrderStatus::PendingPayment),
            "preparing" => Some(OrderStatus::Preparing),
            "in_progress" => Some(OrderStatus::InProgress),
            "ready" => Some(OrderStatus::Ready),
            "completed" => Some(OrderStatus::Completed),
            "cancelled" => Some(OrderStatus::Cancelled),
            "payment_failed" => Some(OrderStatus::PaymentFailed),
            _ => None,
        }
    }

    /// 转换表：当前状态 → 允许的目标状态
    pub fn allowed_targets(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::PendingPayment => &[
                OrderStatus::Preparing,
                OrderStatus::PaymentFailed,
                OrderStatus::Cancelled,
            ],
            OrderStatus::Preparing => &[
                OrderStatus::InProgress,
                OrderStatus::Ready,
                OrderStatus::Cancelled,
            ],
            OrderStatus::InProgress => &[OrderStatus::Ready, OrderStatus::Cancelled],
            OrderStatus::Ready => &[OrderStatus::Completed, OrderStatus::Cancelled],
            // 终态
            OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::PaymentFailed => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_targets().contains(&target)
    }

    pub fn is_terminal(&self) -> bool {
        self.allowed_targets().is_empty()
    }
}

/// 订单领域模型
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    /// 履约门店 — 所有行项目必须属于同一门店
    pub location: String,
    pub items: Vec<OrderItem>,
    pub customer: CustomerInfo,
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub payment_method: PaymentMethod,
    /// 网关分配的支付引用（charge id 或网关订单 id），支付确认前为空
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_reference: Option<String>,
    pub status: OrderStatus,
    /// 管理端设置的预计完成时间（分钟），可独立于状态更新
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// SQLite 行表示 — 金额为 TEXT，items/customer 为 JSON TEXT
#[derive(Debug, FromRow)]
pub struct OrderRow {
    pub id: String,
    pub location: String,
    pub items: String,
    pub customer: String,
    pub subtotal: String,
    pub tax: String,
    pub total: String,
    pub payment_method: String,
    pub payment_reference: Option<String>,
    pub status: String,
    pub estimated_minutes: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let items: Vec<OrderItem> = serde_json::from_str(&row.items)
            .map_err(|e| AppError::database(format!("corrupt items column: {e}")))?;
        let customer: CustomerInfo = serde_json::from_str(&row.customer)
            .map_err(|e| AppError::database(format!("corrupt customer column: {e}")))?;

        let parse_money = |v: &str, col: &str| {
            v.parse::<Decimal>()
                .map_err(|e| AppError::database(format!("corrupt {col} column: {e}")))
        };

        Ok(Order {
            subtotal: parse_money(&row.subtotal, "subtotal")?,
            tax: parse_money(&row.tax, "tax")?,
            total: parse_money(&row.total, "total")?,
            payment_method: PaymentMethod::parse(&row.payment_method).ok_or_else(|| {
                AppError::database(format!("unknown payment_method '{}'", row.payment_method))
            })?,
            status: OrderStatus::parse(&row.status)
                .ok_or_else(|| AppError::database(format!("unknown status '{}'", row.status)))?,
            id: row.id,
            location: row.location,
            items,
            customer,
            payment_reference: row.payment_reference,
            estimated_minutes: row.estimated_minutes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states_have_no_targets() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::PaymentFailed.is_terminal());
        assert!(!OrderStatus::PendingPayment.is_terminal());
    }

    #[test]
    fn test_transition_table_edges() {
        use OrderStatus::*;
        assert!(PendingPayment.can_transition_to(Preparing));
        assert!(PendingPayment.can_transition_to(PaymentFailed));
        assert!(Preparing.can_transition_to(Ready)); // skip in_progress is legal
        assert!(InProgress.can_transition_to(Ready));
        assert!(Ready.can_transition_to(Completed));

        assert!(!PendingPayment.can_transition_to(Ready));
        assert!(!Completed.can_transition_to(Preparing));
        assert!(!Preparing.can_transition_to(PaymentFailed)); // side channel only from pending
        assert!(!Cancelled.can_transition_to(Cancelled));
    }

    #[test]
    fn test_status_round_trip() {
        for s in [
            OrderStatus::PendingPayment,
            OrderStatus::Preparing,
            OrderStatus::InProgress,
            OrderStatus::Ready,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::PaymentFailed,
        ] {
            assert_eq!(OrderStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(OrderStatus::parse("received"), None);
    }
}
