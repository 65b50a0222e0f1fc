//! 数据模型

pub mod order;

pub use order::{CustomerInfo, Order, OrderItem, OrderRow, OrderStatus, PaymentMethod};
