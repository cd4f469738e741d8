//! Webhook signature verification.
//!
//! The payment provider signs every webhook delivery with an HMAC-SHA256
//! digest of the raw request body, sent hex-encoded in a header. We recompute
//! the digest with the shared webhook secret and compare in constant time.
//! Verification must run against the exact bytes on the wire, before any
//! JSON parsing.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 digest of `body` under `secret`.
pub fn sign(body: &str, secret: &str) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body.as_bytes());
    Some(hex::encode(mac.finalize().into_bytes()))
}

/// Check a received signature against the digest we compute ourselves.
pub fn verify(body: &str, signature: &str, secret: &str) -> bool {
    match sign(body, secret) {
        Some(expected) => constant_time_eq(expected.as_bytes(), signature.as_bytes()),
        None => false,
    }
}

/// Compare without short-circuiting so the comparison time doesn't leak
/// how many leading bytes matched.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
