//! Webhook 流水线测试
//!
//! 覆盖签名、去重、乱序与回填。请求体用真实 JSON 字符串 + 真签名，
//! 与 HTTP 层看到的字节一致。

use rust_decimal::Decimal;
use serde_json::json;

use crate::db::models::{OrderStatus, PaymentMethod};
use crate::gateway::{GatewayOrder, signature};
use crate::testing::{TEST_WEBHOOK_SECRET, TestHarness, taco_request};
use crate::utils::AppError;
use crate::webhook::WebhookOutcome;

/// 拼一个 payment.updated 事件体
fn payment_event(event_id: &str, payment_id: &str, status: &str, order_id: Option<&str>) -> Vec<u8> {
    json!({
        "event_id": event_id,
        "type": "payment.updated",
        "data": {
            "object": {
                "payment": {
                    "id": payment_id,
                    "status": status,
                    "order_id": order_id,
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn sign(body: &[u8]) -> String {
    signature::sign(TEST_WEBHOOK_SECRET, body)
}

/// 建一个等 webhook 的 redirect 订单，返回 (本地订单 id, 网关订单 id)
async fn pending_redirect_order(h: &TestHarness) -> (String, String) {
    let outcome = h
        .intake
        .create(taco_request(PaymentMethod::OnlineRedirect))
        .await
        .unwrap();
    let gateway_order_id = format!("gw_{}", outcome.order_id);
    (outcome.order_id, gateway_order_id)
}

#[tokio::test]
async fn test_completed_payment_moves_order_to_preparing() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    let body = payment_event("evt_1", "pay_1", "COMPLETED", Some(&gw_id));
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
    // 支付确认触发下单确认邮件
    assert_eq!(h.notifier.sent_count(), 1);
}

#[tokio::test]
async fn test_invalid_signature_rejected_with_zero_side_effects() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    let body = payment_event("evt_1", "pay_1", "COMPLETED", Some(&gw_id));
    let wrong = signature::sign(b"some_other_secret", &body);

    let err = ingestor.process(&body, Some(&wrong)).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));

    // 订单不动，去重表也不记
    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
    let events: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_events")
        .fetch_one(&h.db.pool)
        .await
        .unwrap();
    assert_eq!(events, 0);
}

#[tokio::test]
async fn test_missing_signature_header_rejected() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();

    let body = payment_event("evt_1", "pay_1", "COMPLETED", None);
    let err = ingestor.process(&body, None).await.unwrap_err();
    assert!(matches!(err, AppError::Unauthorized));
}

#[tokio::test]
async fn test_verification_bypass_accepts_unsigned_body() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor_with(b"irrelevant", false);
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    let body = payment_event("evt_1", "pay_1", "COMPLETED", Some(&gw_id));
    let outcome = ingestor.process(&body, None).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
}

#[tokio::test]
async fn test_duplicate_deliveries_apply_once() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    let body = payment_event("evt_dup", "pay_1", "COMPLETED", Some(&gw_id));
    let sig = sign(&body);

    assert_eq!(
        ingestor.process(&body, Some(&sig)).await.unwrap(),
        WebhookOutcome::Processed
    );
    for _ in 0..3 {
        assert_eq!(
            ingestor.process(&body, Some(&sig)).await.unwrap(),
            WebhookOutcome::AlreadyProcessed
        );
    }

    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
    // 确认邮件恰好一封
    assert_eq!(h.notifier.sent_count(), 1);
}

#[tokio::test]
async fn test_missing_event_id_still_deduplicates() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (_, gw_id) = pending_redirect_order(&h).await;

    // 没有 event_id 的处理商：退化键 = 网关订单 id + 目标状态
    let body = json!({
        "type": "payment.updated",
        "data": { "object": { "payment": {
            "id": "pay_1", "status": "COMPLETED", "order_id": gw_id,
        }}}
    })
    .to_string()
    .into_bytes();
    let sig = sign(&body);

    assert_eq!(
        ingestor.process(&body, Some(&sig)).await.unwrap(),
        WebhookOutcome::Processed
    );
    assert_eq!(
        ingestor.process(&body, Some(&sig)).await.unwrap(),
        WebhookOutcome::AlreadyProcessed
    );
    assert_eq!(h.notifier.sent_count(), 1);
}

#[tokio::test]
async fn test_unrecognized_event_type_acknowledged_and_ignored() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();

    let body = json!({
        "event_id": "evt_refund",
        "type": "refund.created",
        "data": { "object": { "payment": {
            "id": "pay_9", "status": "COMPLETED", "order_id": null,
        }}}
    })
    .to_string()
    .into_bytes();

    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn test_incomplete_payment_status_ignored() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    let body = payment_event("evt_1", "pay_1", "PENDING", Some(&gw_id));
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::Ignored);
    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::PendingPayment);
}

#[tokio::test]
async fn test_unparseable_body_acknowledged_and_ignored() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();

    let body = b"this is not json at all".to_vec();
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}

#[tokio::test]
async fn test_unknown_order_backfilled_from_gateway() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();

    // 本地没有这个订单，但网关认识它
    h.gateway.push_gateway_order(GatewayOrder {
        gateway_order_id: "gw_external_1".to_string(),
        payment_id: Some("pay_ext".to_string()),
        items: vec![],
        customer_name: Some("Walk-in Web".to_string()),
        customer_email: Some("web@example.com".to_string()),
        customer_phone: None,
        total: Decimal::new(1250, 2),
        location: Some("downtown".to_string()),
    });

    let body = payment_event("evt_ext", "pay_ext", "COMPLETED", Some("gw_external_1"));
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();
    assert_eq!(outcome, WebhookOutcome::Processed);

    let order = h
        .orders
        .find_by_payment_reference("gw_external_1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
    assert_eq!(order.total, Decimal::new(1250, 2));
    assert_eq!(order.payment_method, PaymentMethod::OnlineRedirect);
    // 网关没给行项目，物化出占位行保证订单可用
    assert_eq!(order.items.len(), 1);
    assert_eq!(h.notifier.sent_to("web@example.com"), 1);
}

#[tokio::test]
async fn test_order_unknown_everywhere_acknowledged_and_ignored() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();

    let body = payment_event("evt_ghost", "pay_ghost", "COMPLETED", Some("gw_missing"));
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::Ignored);
    assert_eq!(h.order_count().await, 0);
}

#[tokio::test]
async fn test_late_webhook_after_cancellation_ignored() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    // 客户在支付页放弃，店员取消了订单
    h.transitions
        .transition(&order_id, OrderStatus::Cancelled, "staff", None)
        .await
        .unwrap();

    let body = payment_event("evt_late", "pay_1", "COMPLETED", Some(&gw_id));
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();

    // 迟到事件确认后忽略，订单保持取消
    assert_eq!(outcome, WebhookOutcome::Ignored);
    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_webhook_racing_redirect_confirmation_is_idempotent() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();
    let (order_id, gw_id) = pending_redirect_order(&h).await;

    // 客户端回跳确认先到 (同一条边)
    h.transitions
        .transition(&order_id, OrderStatus::Preparing, "checkout", None)
        .await
        .unwrap();
    let after_first = h.notifier.sent_count();

    // webhook 随后到达 — no-op 路径，不重发确认
    let body = payment_event("evt_race", "pay_1", "COMPLETED", Some(&gw_id));
    let outcome = ingestor.process(&body, Some(&sign(&body))).await.unwrap();

    assert_eq!(outcome, WebhookOutcome::Processed);
    assert_eq!(h.notifier.sent_count(), after_first);
    let order = h.orders.find_by_id(&order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
}

#[tokio::test]
async fn test_charge_reference_links_direct_capture_orders() {
    let h = TestHarness::new().await;
    let ingestor = h.ingestor();

    // online_direct 成功后 payment_reference = charge id
    let outcome = h
        .intake
        .create(taco_request(PaymentMethod::OnlineDirect))
        .await
        .unwrap();

    // 处理商事后也发 webhook，order_id 缺失，只有 charge id
    let body = payment_event("evt_chg", "chg_1", "COMPLETED", None);
    let result = ingestor.process(&body, Some(&sign(&body))).await.unwrap();

    // 订单已在 preparing — no-op 幂等
    assert_eq!(result, WebhookOutcome::Processed);
    let order = h.orders.find_by_id(&outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Preparing);
    assert_eq!(h.notifier.sent_count(), 1);
}
