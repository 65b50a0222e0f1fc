//! 管理端认证提取器
//!
//! 单一静态管理令牌 (`ADMIN_TOKEN`)，请求头携带：
//!
//! | 请求头 | 必填 | 说明 |
//! |--------|------|------|
//! | x-admin-token | 是 | 管理令牌，常量时间比较 |
//! | x-actor | 否 | 操作者名 (员工/系统标识)，缺省 "admin" |

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::core::ServerState;
use crate::utils::AppError;

/// 通过管理令牌认证的操作者
pub struct AdminActor(pub String);

impl FromRequestParts<ServerState> for AdminActor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("x-admin-token")
            .and_then(|v| v.to_str().ok())
            .ok_or(AppError::Unauthorized)?;

        if !constant_time_eq(token.as_bytes(), state.config.admin_token.as_bytes()) {
            tracing::warn!("Admin request with invalid token rejected");
            return Err(AppError::Unauthorized);
        }

        let actor = parts
            .headers
            .get("x-actor")
            .and_then(|v| v.to_str().ok())
            .filter(|s| !s.is_empty())
            .unwrap_or("admin")
            .to_string();

        Ok(AdminActor(actor))
    }
}

/// 令牌比较不能提前返回，避免时序侧信道
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_basic() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret1"));
        assert!(!constant_time_eq(b"", b"x"));
        assert!(constant_time_eq(b"", b""));
    }
}
