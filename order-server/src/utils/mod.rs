//! 工具模块 - 通用工具函数和类型
//!
//! # 内容
//!
//! - [`AppError`] / [`AppResult`] - 应用错误类型
//! - [`logger`] - 日志初始化
//! - [`validation`] - 输入校验

pub mod error;
pub mod logger;
pub mod validation;

pub use error::{AppError, AppResponse, AppResult};

/// 当前 Unix 时间戳 (毫秒)
///
/// Repository 层统一使用 `i64` Unix millis。
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
