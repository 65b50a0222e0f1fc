//! Order API Handlers

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use crate::api::auth::AdminActor;
use crate::core::ServerState;
use crate::db::models::{Order, OrderStatus};
use crate::db::repository::OrderRepository;
use crate::orders::{CreateOrderRequest, IntakeOutcome};
use crate::utils::{AppError, AppResult};

/// 下单 (结账)
///
/// 校验 → 落库 → 按支付方式走三条路径之一。
/// 成功 201；支付被拒 402 (订单保留在 payment_failed 供排查)。
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<CreateOrderRequest>,
) -> AppResult<(StatusCode, Json<IntakeOutcome>)> {
    let outcome = state.intake.create(payload).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Get order by id
pub async fn get_by_id(
    State(state): State<ServerState>,
    Path(id): Path<String>,
) -> AppResult<Json<Order>> {
    let repo = OrderRepository::new(state.db.pool.clone());
    let order = repo
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::not_found(format!("Order {} not found", id)))?;
    Ok(Json(order))
}

/// 状态转换请求体
#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    /// 目标状态 (机读字符串，如 "ready")
    pub status: String,
    /// 预计完成分钟数 (可选，随转换一起更新)
    #[serde(default)]
    pub estimated_minutes: Option<i64>,
}

/// 管理端状态转换
///
/// 非法边 422；目标状态等于当前状态时幂等成功。
pub async fn update_status(
    State(state): State<ServerState>,
    AdminActor(actor): AdminActor,
    Path(id): Path<String>,
    Json(payload): Json<UpdateStatusRequest>,
) -> AppResult<Json<Order>> {
    let target = OrderStatus::parse(&payload.status).ok_or_else(|| {
        AppError::validation(format!("Unknown order status: {}", payload.status))
    })?;

    let order = state
        .transitions
        .transition(&id, target, &actor, payload.estimated_minutes)
        .await?;

    Ok(Json(order))
}
