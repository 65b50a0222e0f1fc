//! Status Transition Manager
//!
//! 订单状态机。合法边见 [`OrderStatus::allowed_targets`]，
//! 写入走仓库的状态 CAS，单订单上的并发转换被串行化：
//! 同一源状态出发的两个不同目标恰好一个成功，另一个观察到
//! 过期源状态后得到 `InvalidTransition`（或命中 no-op 幂等路径）。
//!
//! # 通知策略
//!
//! 转换持久化成功后，对客户可见的目标状态发送一封模板邮件。
//! 发送失败只记日志 — 状态机的事实来源是已持久化的状态，
//! 不是邮件投递 (best-effort / at-least-once)。
//! no-op 转换（current == target）幂等成功且不重发通知，
//! 支撑 webhook ingestor 的幂等要求。

use std::sync::Arc;

use crate::db::models::{Order, OrderStatus};
use crate::db::repository::OrderRepository;
use crate::notify::{NotificationSender, NotificationTemplate};
use crate::utils::{AppError, AppResult};

#[derive(Clone)]
pub struct StatusTransitionManager {
    repo: OrderRepository,
    notifier: Arc<dyn NotificationSender>,
    /// 门店管理邮箱 — 下单确认抄送一份（单一配置值，不做按端点白名单）
    admin_email: Option<String>,
}

impl StatusTransitionManager {
    pub fn new(
        repo: OrderRepository,
        notifier: Arc<dyn NotificationSender>,
        admin_email: Option<String>,
    ) -> Self {
        Self {
            repo,
            notifier,
            admin_email,
        }
    }

    /// 执行一次状态转换
    ///
    /// - `NotFound`: 订单不存在
    /// - no-op (current == target): 幂等成功，不发通知；
    ///   `estimated_minutes` 仍会更新（管理端单独调整预计时间）
    /// - 非法边: `InvalidTransition`，订单不变
    /// - CAS 落败: 重读后目标已达成 → 幂等成功；否则 `InvalidTransition`
    pub async fn transition(
        &self,
        order_id: &str,
        target: OrderStatus,
        actor: &str,
        estimated_minutes: Option<i64>,
    ) -> AppResult<Order> {
        let order = self
            .repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;

        let current = order.status;

        // 幂等 no-op：webhook 重放、redirect 回跳与 webhook 竞争的第二名
        if current == target {
            if let Some(minutes) = estimated_minutes {
                self.repo.update_estimated_minutes(order_id, minutes).await?;
            }
            tracing::debug!(
                order_id = %order_id,
                status = %current.as_str(),
                actor = %actor,
                "No-op transition, already in target status"
            );
            return self.reload(order_id).await;
        }

        if !current.can_transition_to(target) {
            return Err(AppError::invalid_transition(current.as_str(), target.as_str()));
        }

        let won = self
            .repo
            .cas_status(order_id, current, target, estimated_minutes)
            .await?;

        if !won {
            // 读-校验-写序列输给了并发调用者，以落库状态为准重新裁决
            let now = self
                .repo
                .find_by_id(order_id)
                .await?
                .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))?;
            if now.status == target {
                // 对手应用了同一条边 — 幂等成功，通知已由胜者发出
                return Ok(now);
            }
            return Err(AppError::invalid_transition(
                now.status.as_str(),
                target.as_str(),
            ));
        }

        tracing::info!(
            order_id = %order_id,
            from = %current.as_str(),
            to = %target.as_str(),
            actor = %actor,
            "Order status transitioned"
        );

        let updated = self.reload(order_id).await?;
        self.notify(target, &updated).await;

        Ok(updated)
    }

    async fn reload(&self, order_id: &str) -> AppResult<Order> {
        self.repo
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| AppError::not_found(format!("Order {order_id} not found")))
    }

    /// 转换成功后的通知 — 失败不回传
    async fn notify(&self, target: OrderStatus, order: &Order) {
        // payment_failed 不通知客户：结账调用方已收到 402
        if target == OrderStatus::PaymentFailed {
            return;
        }

        // 网关回填的订单可能没有客户邮箱
        if order.customer.email.is_empty() {
            tracing::debug!(order_id = %order.id, "No customer email on order, skipping notification");
            return;
        }

        let template = if target == OrderStatus::Preparing {
            NotificationTemplate::OrderConfirmation
        } else {
            NotificationTemplate::StatusUpdate
        };

        if let Err(e) = self
            .notifier
            .send(template, &order.customer.email, order)
            .await
        {
            tracing::warn!(
                order_id = %order.id,
                recipient = %order.customer.email,
                error = %e,
                "Failed to send customer notification"
            );
        }

        // 下单确认抄送门店管理邮箱
        if template == NotificationTemplate::OrderConfirmation
            && let Some(admin) = &self.admin_email
            && let Err(e) = self.notifier.send(template, admin, order).await
        {
            tracing::warn!(
                order_id = %order.id,
                recipient = %admin,
                error = %e,
                "Failed to send admin notification"
            );
        }
    }
}
