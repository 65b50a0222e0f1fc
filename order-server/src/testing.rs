//! 测试替身与公共测试装置
//!
//! 领域层测试共享：tempdir SQLite、mock 支付网关、计数通知器。
//! 只在 `cfg(test)` 下编译。

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use tempfile::TempDir;

use crate::db::DbService;
use crate::db::models::{Order, OrderItem};
use crate::db::repository::{OrderRepository, WebhookEventRepository};
use crate::gateway::{GatewayError, GatewayOrder, PaymentGateway, PaymentLink};
use crate::notify::{NotificationSender, NotificationTemplate, NotifyError};
use crate::orders::intake::{CreateOrderCustomer, CreateOrderItem, CreateOrderRequest};
use crate::orders::{OrderIntakeService, StatusTransitionManager};
use crate::webhook::WebhookIngestor;

/// webhook 测试用的签名密钥
pub const TEST_WEBHOOK_SECRET: &[u8] = b"whsec_test123secret456";

/// Mock 网关行为
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayMode {
    Succeed,
    Decline,
    Timeout,
}

/// Mock 支付网关
///
/// - `capture` 返回 `chg_<n>` 引用，`n` 为调用序号
/// - `create_payment_link` 返回 `gw_<本地订单id>` 网关订单号
/// - `retrieve_order` 查 [`push_gateway_order`](Self::push_gateway_order) 注册的表
pub struct MockGateway {
    mode: Mutex<GatewayMode>,
    known_orders: Mutex<HashMap<String, GatewayOrder>>,
    pub capture_calls: AtomicUsize,
    pub link_calls: AtomicUsize,
}

impl MockGateway {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            mode: Mutex::new(GatewayMode::Succeed),
            known_orders: Mutex::new(HashMap::new()),
            capture_calls: AtomicUsize::new(0),
            link_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_mode(&self, mode: GatewayMode) {
        *self.mode.lock().unwrap() = mode;
    }

    fn mode(&self) -> GatewayMode {
        *self.mode.lock().unwrap()
    }

    /// 注册一个网关侧可查到的订单 (backfill 测试)
    pub fn push_gateway_order(&self, detail: GatewayOrder) {
        self.known_orders
            .lock()
            .unwrap()
            .insert(detail.gateway_order_id.clone(), detail);
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn capture(&self, _token: &str, _amount: Decimal) -> Result<String, GatewayError> {
        let n = self.capture_calls.fetch_add(1, Ordering::SeqCst) + 1;
        match self.mode() {
            GatewayMode::Succeed => Ok(format!("chg_{n}")),
            GatewayMode::Decline => Err(GatewayError::Declined("card declined".into())),
            GatewayMode::Timeout => Err(GatewayError::Timeout),
        }
    }

    async fn create_payment_link(
        &self,
        local_order_id: &str,
        _amount: Decimal,
        _items: &[OrderItem],
    ) -> Result<PaymentLink, GatewayError> {
        self.link_calls.fetch_add(1, Ordering::SeqCst);
        match self.mode() {
            GatewayMode::Succeed => Ok(PaymentLink {
                url: format!("https://pay.example.com/checkout/{local_order_id}"),
                gateway_order_id: format!("gw_{local_order_id}"),
            }),
            GatewayMode::Decline => Err(GatewayError::Api("link rejected".into())),
            GatewayMode::Timeout => Err(GatewayError::Timeout),
        }
    }

    async fn retrieve_order(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<GatewayOrder>, GatewayError> {
        Ok(self
            .known_orders
            .lock()
            .unwrap()
            .get(gateway_order_id)
            .cloned())
    }
}

/// 记录每次发送的计数通知器
#[derive(Default)]
pub struct CountingNotifier {
    pub sent: Mutex<Vec<(NotificationTemplate, String)>>,
    /// true 时所有发送失败 — 验证通知失败不阻塞状态机
    pub fail: std::sync::atomic::AtomicBool,
}

impl CountingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent_to(&self, recipient: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| r == recipient)
            .count()
    }
}

#[async_trait]
impl NotificationSender for CountingNotifier {
    async fn send(
        &self,
        template: NotificationTemplate,
        recipient: &str,
        _order: &Order,
    ) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotifyError::Api("mail service down".into()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((template, recipient.to_string()));
        Ok(())
    }
}

/// 领域层测试装置：tempdir 数据库 + 全套服务
pub struct TestHarness {
    // tempdir 随装置存活，drop 时清理数据库文件
    _dir: TempDir,
    pub db: DbService,
    pub orders: OrderRepository,
    pub events: WebhookEventRepository,
    pub gateway: Arc<MockGateway>,
    pub notifier: Arc<CountingNotifier>,
    pub transitions: StatusTransitionManager,
    pub intake: OrderIntakeService,
}

impl TestHarness {
    pub async fn new() -> Self {
        Self::with_admin_email(None).await
    }

    pub async fn with_admin_email(admin_email: Option<&str>) -> Self {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("orders-test.db");
        let db = DbService::new(db_path.to_str().unwrap()).await.unwrap();

        let orders = OrderRepository::new(db.pool.clone());
        let events = WebhookEventRepository::new(db.pool.clone());
        let gateway = MockGateway::new();
        let notifier = CountingNotifier::new();

        let transitions = StatusTransitionManager::new(
            orders.clone(),
            notifier.clone(),
            admin_email.map(str::to_string),
        );
        let intake = OrderIntakeService::new(
            orders.clone(),
            gateway.clone(),
            transitions.clone(),
        );

        Self {
            _dir: dir,
            db,
            orders,
            events,
            gateway,
            notifier,
            transitions,
            intake,
        }
    }

    /// 构建默认配置的 webhook 流水线 (签名验证开启)
    pub fn ingestor(&self) -> WebhookIngestor {
        self.ingestor_with(TEST_WEBHOOK_SECRET, true)
    }

    pub fn ingestor_with(&self, secret: &[u8], verify_signatures: bool) -> WebhookIngestor {
        WebhookIngestor::new(
            self.orders.clone(),
            self.events.clone(),
            self.gateway.clone(),
            self.transitions.clone(),
            secret.to_vec(),
            verify_signatures,
        )
    }

    /// 数据库里的订单总数
    pub async fn order_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.db.pool)
            .await
            .unwrap()
    }
}

/// 两份玉米卷 + 税的标准下单请求 (7.00 + 0.56 = 7.56)
pub fn taco_request(payment_method: crate::db::models::PaymentMethod) -> CreateOrderRequest {
    CreateOrderRequest {
        location: "downtown".to_string(),
        items: vec![CreateOrderItem {
            name: "Carnitas Taco".to_string(),
            quantity: 2,
            unit_price: Decimal::new(350, 2),
            location: None,
            special_instructions: Some("extra salsa".to_string()),
        }],
        customer: CreateOrderCustomer {
            name: "Dana Smith".to_string(),
            email: "dana@example.com".to_string(),
            phone: "555-0100".to_string(),
            special_instructions: None,
        },
        subtotal: Decimal::new(700, 2),
        tax: Decimal::new(56, 2),
        total: Decimal::new(756, 2),
        payment_method,
        card_token: Some("tok_visa".to_string()),
    }
}
