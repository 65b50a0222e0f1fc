use std::sync::Arc;

use crate::core::Config;
use crate::db::DbService;
use crate::db::repository::{OrderRepository, WebhookEventRepository};
use crate::gateway::{HttpPaymentGateway, PaymentGateway};
use crate::notify::{EmailNotifier, NotificationSender};
use crate::orders::{OrderIntakeService, StatusTransitionManager};
use crate::utils::AppResult;
use crate::webhook::WebhookIngestor;

/// 服务器状态 - 持有所有服务的共享引用
///
/// ServerState 是订单服务的核心数据结构。
/// 使用 Arc 实现浅拷贝，克隆成本极低。
///
/// # 服务组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | db | DbService | SQLite 连接池 |
/// | transitions | StatusTransitionManager | 订单状态机 |
/// | intake | OrderIntakeService | 下单服务 |
/// | ingestor | Arc<WebhookIngestor> | webhook 处理流水线 |
#[derive(Clone)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 数据库服务
    pub db: DbService,
    /// 订单状态机
    pub transitions: StatusTransitionManager,
    /// 下单服务
    pub intake: OrderIntakeService,
    /// webhook 处理流水线
    pub ingestor: Arc<WebhookIngestor>,
}

impl ServerState {
    /// 初始化所有服务 (生产入口)
    ///
    /// 网关与邮件服务商走真实 HTTP 客户端；
    /// 测试用 [`with_collaborators`](Self::with_collaborators) 注入替身。
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let db = DbService::new(&config.database_path).await?;

        let gateway: Arc<dyn PaymentGateway> = Arc::new(HttpPaymentGateway::new(
            config.gateway_base_url.clone(),
            config.gateway_api_key.clone(),
            config.gateway_timeout_ms,
        ));

        let notifier: Arc<dyn NotificationSender> = Arc::new(EmailNotifier::new(
            config.mail_api_url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
            config.mail_timeout_ms,
        ));

        Ok(Self::with_collaborators(config.clone(), db, gateway, notifier))
    }

    /// 用外部提供的网关/通知实现组装状态
    ///
    /// 测试场景注入 mock 网关和计数通知器
    pub fn with_collaborators(
        config: Config,
        db: DbService,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSender>,
    ) -> Self {
        let orders = OrderRepository::new(db.pool.clone());
        let events = WebhookEventRepository::new(db.pool.clone());

        let transitions =
            StatusTransitionManager::new(orders.clone(), notifier, config.admin_email.clone());

        let intake =
            OrderIntakeService::new(orders.clone(), gateway.clone(), transitions.clone());

        let ingestor = Arc::new(WebhookIngestor::new(
            orders,
            events,
            gateway,
            transitions.clone(),
            config.webhook_secret.as_bytes().to_vec(),
            config.webhook_verify_signatures,
        ));

        Self {
            config,
            db,
            transitions,
            intake,
            ingestor,
        }
    }
}
