//! Webhook 签名验证
//!
//! 对原始请求体计算 HMAC-SHA256，与签名头中的 hex 摘要常数时间比较。
//! 验证失败 fail closed — 事件不处理，零副作用。

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify `signature_header` (lowercase hex) against HMAC-SHA256 of `body`.
///
/// Comparison goes through [`Mac::verify_slice`], which is constant time.
/// Any decode failure counts as a mismatch.
pub fn verify(secret: &[u8], body: &[u8], signature_header: &str) -> bool {
    let Ok(expected) = hex::decode(signature_header.trim()) else {
        return false;
    };

    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex signature for `body` (test helpers, outbound signing)
pub fn sign(secret: &[u8], body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}
