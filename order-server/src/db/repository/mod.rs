//! Repository 层
//!
//! 每个仓库持有连接池克隆，提供领域模型级别的读写接口。
//! 时间戳统一 `i64` Unix millis；金额在行类型中转换。

pub mod order;
pub mod webhook_event;

pub use order::OrderRepository;
pub use webhook_event::WebhookEventRepository;
