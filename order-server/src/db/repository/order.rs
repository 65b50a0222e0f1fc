//! Order Repository
//!
//! 订单表读写。状态变更只通过 [`cas_status`](OrderRepository::cas_status) —
//! 基于当前状态的原子 compare-and-set，为状态机提供单订单串行化保证。

use sqlx::SqlitePool;

use crate::db::models::{Order, OrderRow, OrderStatus};
use crate::utils::{AppResult, now_millis};

#[derive(Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 插入新订单
    pub async fn create(&self, order: &Order) -> AppResult<()> {
        let items = serde_json::to_string(&order.items)
            .map_err(|e| crate::utils::AppError::internal(format!("serialize items: {e}")))?;
        let customer = serde_json::to_string(&order.customer)
            .map_err(|e| crate::utils::AppError::internal(format!("serialize customer: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, location, items, customer,
                subtotal, tax, total,
                payment_method, payment_reference, status,
                estimated_minutes, created_at, updated_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(&order.location)
        .bind(items)
        .bind(customer)
        .bind(order.subtotal.to_string())
        .bind(order.tax.to_string())
        .bind(order.total.to_string())
        .bind(order.payment_method.as_str())
        .bind(&order.payment_reference)
        .bind(order.status.as_str())
        .bind(order.estimated_minutes)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// 按 id 查询
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Order::try_from).transpose()
    }

    /// 按网关支付引用查询（webhook 关联）
    pub async fn find_by_payment_reference(&self, reference: &str) -> AppResult<Option<Order>> {
        let row: Option<OrderRow> =
            sqlx::query_as("SELECT * FROM orders WHERE payment_reference = ?")
                .bind(reference)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Order::try_from).transpose()
    }

    /// 记录网关支付引用（同步扣款成功 / 支付链接创建后）
    pub async fn set_payment_reference(&self, id: &str, reference: &str) -> AppResult<()> {
        sqlx::query("UPDATE orders SET payment_reference = ?, updated_at = ? WHERE id = ?")
            .bind(reference)
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// 状态 compare-and-set
    ///
    /// 只有当前状态等于 `expected` 时才写入 `target`；返回是否命中。
    /// 两个并发调用者从同一源状态出发时恰好一个成功。
    /// `estimated_minutes` 为 `Some` 时随转换一并持久化。
    pub async fn cas_status(
        &self,
        id: &str,
        expected: OrderStatus,
        target: OrderStatus,
        estimated_minutes: Option<i64>,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET status = ?,
                estimated_minutes = COALESCE(?, estimated_minutes),
                updated_at = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(target.as_str())
        .bind(estimated_minutes)
        .bind(now_millis())
        .bind(id)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 单独更新预计完成时间（不触发状态转换）
    pub async fn update_estimated_minutes(&self, id: &str, minutes: i64) -> AppResult<bool> {
        let result = sqlx::query("UPDATE orders SET estimated_minutes = ?, updated_at = ? WHERE id = ?")
            .bind(minutes)
            .bind(now_millis())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }
}
