//! OKX v5 REST request signing: `base64(HMAC-SHA256(secret, timestamp +
//! method + requestPath + body))`, with an ISO-8601-millisecond timestamp
//! the signature and the `OK-ACCESS-TIMESTAMP` header must agree on exactly.

use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// `2020-12-08T09:08:57.715Z` — the exact format OKX expects.
pub fn iso_timestamp_now() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// `request_path` must include the query string for GET requests and `body`
/// must be the exact bytes sent on the wire (empty string for GET/DELETE).
pub fn sign(secret: &str, timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
    let prehash = format!("{timestamp}{method}{request_path}{body}");
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts a key of any length");
    mac.update(prehash.as_bytes());
    base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes())
}
