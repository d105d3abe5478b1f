//! HMAC-SHA256 request signing for the Delta Exchange REST API.
//!
//! Signed string: `method + timestamp + path + query_string + body`, hex digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub fn sign(
    secret: &str,
    method: &str,
    timestamp: &str,
    path: &str,
    query_string: &str,
    body: &str,
) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(method.as_bytes());
    mac.update(timestamp.as_bytes());
    mac.update(path.as_bytes());
    mac.update(query_string.as_bytes());
    mac.update(body.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// `?k1=v1&k2=v2` in the given order, or an empty string when there are no params.
pub fn query_string(params: &[(&str, String)]) -> String {
    if params.is_empty() {
        return String::new();
    }
    let joined = params
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");
    format!("?{}", joined)
}
