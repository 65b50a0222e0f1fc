//! Order API Module
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/orders | POST | 下单 (结账) | 无 |
//! | /api/orders/{id} | GET | 订单详情 | 无 |
//! | /api/orders/{id}/status | PATCH | 状态转换 | 管理令牌 |

mod handler;

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_by_id))
        // 状态转换是唯一的管理端写入口
        .route("/{id}/status", patch(handler::update_status))
}
