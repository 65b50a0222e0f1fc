//! 订单领域层
//!
//! - [`intake`] - Order Intake Service：校验、持久化、支付路径决策
//! - [`transition`] - Status Transition Manager：状态机 + 通知副作用

pub mod intake;
pub mod transition;


pub use intake::{CreateOrderRequest, IntakeOutcome, OrderIntakeService};
pub use transition::StatusTransitionManager;
