//! Webhook API Handlers
//!
//! 签名验证需要原始字节，所以用 `Bytes` 而不是 `Json` 提取请求体 —
//! 反序列化再序列化不保证字节级一致。

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::HeaderMap,
};
use serde::Serialize;

use crate::core::ServerState;
use crate::utils::AppResult;

/// 处理商放签名的请求头
const SIGNATURE_HEADER: &str = "x-provider-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    /// processed | ignored | duplicate
    result: &'static str,
}

/// 支付处理商回调入口
///
/// 401 会让处理商重试 — 签名失败时这正是想要的行为；
/// 已确认但无法处理的事件返回 200 忽略，避免无限重试。
pub async fn receive_payment(
    State(state): State<ServerState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookResponse>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    let outcome = state.ingestor.process(&body, signature).await?;

    Ok(Json(WebhookResponse {
        result: outcome.as_str(),
    }))
}
