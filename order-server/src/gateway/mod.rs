//! 支付网关适配层
//!
//! 封装对外部支付处理商的调用：同步扣款、托管支付链接、订单查询。
//! 对本地订单语义零感知 — 调用方（intake / webhook ingestor）负责
//! 把网关结果映射到订单状态。
//!
//! # 超时语义
//!
//! [`GatewayError::Timeout`] 表示"结果未知"：调用方不得乐观推进订单
//! （未支付订单绝不进入 preparing），webhook 仍可能事后确认。

pub mod http;
pub mod signature;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::models::OrderItem;

pub use http::HttpPaymentGateway;

/// 网关调用错误
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// 网关明确拒绝（卡被拒、金额不符等）
    #[error("payment declined: {0}")]
    Declined(String),

    /// 出站调用超时 — 结果未知
    #[error("gateway request timed out")]
    Timeout,

    /// 其他 API 错误（网络、5xx、响应不可解析）
    #[error("gateway error: {0}")]
    Api(String),
}

/// 托管支付链接
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentLink {
    /// 客户端跳转 URL
    pub url: String,
    /// 网关侧订单 id — 存入 `Order.payment_reference` 用于 webhook 关联
    pub gateway_order_id: String,
}

/// 网关侧订单详情（redirect 流程回填本地订单用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    #[serde(default)]
    pub payment_id: Option<String>,
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
    pub total: Decimal,
    #[serde(default)]
    pub location: Option<String>,
}

/// 支付网关接口
///
/// trait 边界用于测试注入 mock — 所有网关交互都经过这里。
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// 同步扣款，返回网关支付引用 (charge id)
    async fn capture(&self, token: &str, amount: Decimal) -> Result<String, GatewayError>;

    /// 创建托管支付链接
    async fn create_payment_link(
        &self,
        local_order_id: &str,
        amount: Decimal,
        items: &[OrderItem],
    ) -> Result<PaymentLink, GatewayError>;

    /// 按网关订单 id 查询订单详情；网关不认识该 id 时返回 `None`
    async fn retrieve_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<GatewayOrder>, GatewayError>;
}
