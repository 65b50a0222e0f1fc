//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`orders`] - 订单创建 / 查询 / 管理端状态更新
//! - [`webhooks`] - 支付处理商回调

pub mod auth;
pub mod health;
pub mod orders;
pub mod webhooks;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// 组装完整路由 (含中间件)
///
/// 测试通过 `tower::ServiceExt::oneshot` 直接驱动这个 Router。
pub fn router(state: ServerState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(orders::router())
        .merge(webhooks::router())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
