//! Webhook Event Repository
//!
//! 已处理 webhook 投递的去重表。event_id 主键 + `INSERT OR IGNORE`
//! 构成幂等边界的第一半（第二半是状态机的 CAS / no-op 守卫）。
//! 持久化而非内存 — 进程可能水平扩展。

use sqlx::SqlitePool;

use crate::utils::{AppResult, now_millis};

#[derive(Clone)]
pub struct WebhookEventRepository {
    pool: SqlitePool,
}

impl WebhookEventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// 记录一次投递
    ///
    /// 返回 `true` 表示首次见到该 event_id；`false` 表示重复投递，
    /// 调用方应跳过全部副作用。
    pub async fn record(&self, event_id: &str, gateway_order_id: Option<&str>) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO webhook_events (event_id, gateway_order_id, received_at) VALUES (?, ?, ?)",
        )
        .bind(event_id)
        .bind(gateway_order_id)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// 删除一条投递记录
    ///
    /// 副作用阶段失败时的补偿：去重行先于副作用写入，不删除的话
    /// 供应商重试会被当成重复投递吞掉，事件就丢了。
    pub async fn remove(&self, event_id: &str) -> AppResult<()> {
        sqlx::query("DELETE FROM webhook_events WHERE event_id = ?")
            .bind(event_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
