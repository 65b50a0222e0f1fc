//! Webhook Ingestor
//!
//! 接收支付处理商的异步回调，验真、去重、关联本地订单，
//! 每个事件恰好驱动一次状态机。

pub mod ingest;

#[cfg(test)]
mod tests;

pub use ingest::{WebhookIngestor, WebhookOutcome};
