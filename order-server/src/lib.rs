//! Order Server - 在线点餐的订单与支付对账服务
//!
//! # 架构概述
//!
//! 本模块是 Order Server 的主入口，提供以下核心功能：
//!
//! - **下单** (`orders::intake`): 校验、落库、三条支付路径
//! - **状态机** (`orders::transition`): 订单生命周期 + 通知副作用
//! - **Webhook** (`webhook`): 支付处理商回调的验真、去重、对账
//! - **支付网关** (`gateway`): HTTP 网关客户端 + HMAC 签名验证
//! - **HTTP API** (`api`): RESTful API 接口
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、启动
//! ├── api/           # HTTP 路由和处理器
//! ├── orders/        # 下单 + 状态机
//! ├── webhook/       # 回调处理流水线
//! ├── gateway/       # 支付网关客户端、签名
//! ├── notify/        # 客户通知
//! ├── db/            # 数据库层
//! └── utils/         # 错误、日志、校验
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod gateway;
pub mod notify;
pub mod orders;
pub mod utils;
pub mod webhook;

#[cfg(test)]
pub(crate) mod testing;

// Re-export 公共类型
pub use crate::core::{Config, Server, ServerState};
pub use db::models::{Order, OrderStatus, PaymentMethod};
pub use orders::{CreateOrderRequest, IntakeOutcome, OrderIntakeService, StatusTransitionManager};
pub use utils::{AppError, AppResponse, AppResult};
pub use webhook::{WebhookIngestor, WebhookOutcome};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
///
/// 先加载 .env 再初始化日志，LOG_DIR 才能从 .env 里生效。
pub fn setup_environment() {
    dotenv::dotenv().ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(None, log_dir.as_deref());
}

pub fn print_banner() {
    println!(
        r#"
   ____          __
  / __ \_______/ /__  _____
 / / / / ___/ __  / _ \/ ___/
/ /_/ / /  / /_/ /  __/ /
\____/_/   \__,_/\___/_/
   _____
  / ___/___  ______   _____  _____
  \__ \/ _ \/ ___/ | / / _ \/ ___/
 ___/ /  __/ /   | |/ /  __/ /
/____/\___/_/    |___/\___/_/
    "#
    );
}
