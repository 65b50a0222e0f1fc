/// 服务器配置 - 订单服务的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | DATABASE_PATH | ./data/orders.db | SQLite 数据库文件 |
/// | LOG_DIR | (无) | 日志目录，设置后按天滚动写文件 |
/// | ENVIRONMENT | development | 运行环境 |
/// | GATEWAY_BASE_URL | https://connect.example-payments.com | 支付网关地址 |
/// | GATEWAY_API_KEY | (空) | 支付网关密钥 |
/// | GATEWAY_TIMEOUT_MS | 10000 | 网关请求超时(毫秒) |
/// | WEBHOOK_SECRET | (空) | webhook HMAC 签名密钥 |
/// | WEBHOOK_VERIFY_SIGNATURES | true | 是否验证 webhook 签名 |
/// | MAIL_API_URL | (空) | 邮件服务商 API 地址 |
/// | MAIL_API_KEY | (空) | 邮件服务商密钥 |
/// | MAIL_FROM | orders@example.com | 发件地址 |
/// | MAIL_TIMEOUT_MS | 5000 | 邮件请求超时(毫秒) |
/// | ADMIN_EMAIL | (无) | 门店管理邮箱，下单确认抄送 |
/// | ADMIN_TOKEN | (空) | 管理端静态令牌 |
///
/// # 示例
///
/// ```ignore
/// HTTP_PORT=8080 DATABASE_PATH=/data/orders.db cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// SQLite 数据库文件路径
    pub database_path: String,
    /// 日志目录 (设置后写滚动日志文件)
    pub log_dir: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,

    // === 支付网关 ===
    /// 网关 API 基址
    pub gateway_base_url: String,
    /// 网关密钥
    pub gateway_api_key: String,
    /// 网关请求超时 (毫秒)
    pub gateway_timeout_ms: u64,

    // === Webhook ===
    /// webhook HMAC-SHA256 签名密钥
    pub webhook_secret: String,
    /// 是否验证 webhook 签名 — 只有测试/预发允许关
    pub webhook_verify_signatures: bool,

    // === 通知 ===
    /// 邮件服务商 API 地址
    pub mail_api_url: String,
    /// 邮件服务商密钥
    pub mail_api_key: String,
    /// 发件地址
    pub mail_from: String,
    /// 邮件请求超时 (毫秒)
    pub mail_timeout_ms: u64,
    /// 门店管理邮箱 (下单确认抄送)
    pub admin_email: Option<String>,

    // === 管理端 ===
    /// 管理端静态令牌
    pub admin_token: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值。
    /// 生产环境强制开启 webhook 签名验证，不接受关闭。
    pub fn from_env() -> Self {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let mut verify_signatures = std::env::var("WEBHOOK_VERIFY_SIGNATURES")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(true);
        if environment == "production" && !verify_signatures {
            tracing::error!(
                "WEBHOOK_VERIFY_SIGNATURES=false is not honored in production, forcing on"
            );
            verify_signatures = true;
        }

        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(3000),
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "./data/orders.db".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
            environment,

            gateway_base_url: std::env::var("GATEWAY_BASE_URL")
                .unwrap_or_else(|_| "https://connect.example-payments.com".into()),
            gateway_api_key: std::env::var("GATEWAY_API_KEY").unwrap_or_default(),
            gateway_timeout_ms: std::env::var("GATEWAY_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(10000),

            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            webhook_verify_signatures: verify_signatures,

            mail_api_url: std::env::var("MAIL_API_URL").unwrap_or_default(),
            mail_api_key: std::env::var("MAIL_API_KEY").unwrap_or_default(),
            mail_from: std::env::var("MAIL_FROM").unwrap_or_else(|_| "orders@example.com".into()),
            mail_timeout_ms: std::env::var("MAIL_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            admin_email: std::env::var("ADMIN_EMAIL").ok().filter(|s| !s.is_empty()),

            admin_token: std::env::var("ADMIN_TOKEN").unwrap_or_default(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
