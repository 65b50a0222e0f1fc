//! 通知发送
//!
//! 模板邮件（下单确认、状态变更）。状态机视角下 fire-and-forget：
//! 发送失败只记日志，绝不阻塞或回滚已持久化的状态转换
//! (at-least-once 通知 vs exactly-once 转换)。

pub mod email;

use async_trait::async_trait;

use crate::db::models::Order;

pub use email::EmailNotifier;

/// 通知发送错误 — 只在本模块内部与转换点日志中出现，
/// 从不转换为 `AppError` 返回给调用方。
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail API error: {0}")]
    Api(String),

    #[error("mail request timed out")]
    Timeout,
}

/// 通知模板
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationTemplate {
    /// 下单确认（首次进入 preparing）
    OrderConfirmation,
    /// 后续状态变更
    StatusUpdate,
}

impl NotificationTemplate {
    pub fn subject(&self, order: &Order) -> String {
        match self {
            NotificationTemplate::OrderConfirmation => {
                format!("Order confirmed - #{}", short_id(&order.id))
            }
            NotificationTemplate::StatusUpdate => format!(
                "Order #{} is now {}",
                short_id(&order.id),
                order.status.as_str().replace('_', " ")
            ),
        }
    }
}

/// 邮件主题里用的短订单号
fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

/// 通知发送接口
#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        order: &Order,
    ) -> Result<(), NotifyError>;
}
