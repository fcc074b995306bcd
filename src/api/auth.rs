//! Webhook authentication
//!
//! Shared-secret header check with constant-time comparison. An empty
//! secret disables authentication (development mode — loudly logged at
//! startup). A configured trusted-network prefix lets peers on that
//! network skip the token; the bypass is off unless explicitly enabled.

use std::net::SocketAddr;

use axum::http::HeaderMap;

use crate::config::AppConfig;

/// Header carrying the shared secret.
pub const TOKEN_HEADER: &str = "x-webhook-token";

/// Constant-time byte comparison. Length mismatch short-circuits, which
/// leaks only the length — same contract as `hmac.compare_digest`.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Decide whether a request is allowed to reach the controller.
pub fn verify_request(
    config: &AppConfig,
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
) -> bool {
    if let (Some(prefix), Some(addr)) = (&config.trusted_network_prefix, peer) {
        if addr.ip().to_string().starts_with(prefix.as_str()) {
            return true;
        }
    }

    if !config.auth_enabled() {
        return true;
    }

    headers
        .get(TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .map_or(false, |token| {
            constant_time_eq(token.as_bytes(), config.webhook_secret.as_bytes())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config_with_secret(secret: &str) -> AppConfig {
        AppConfig {
            webhook_secret: secret.to_string(),
            ..AppConfig::default()
        }
    }

    fn headers_with_token(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            TOKEN_HEADER,
            HeaderValue::from_str(token).expect("valid header value"),
        );
        headers
    }

    #[test]
    fn correct_token_is_accepted() {
        let cfg = config_with_secret("s3cret");
        assert!(verify_request(&cfg, &headers_with_token("s3cret"), None));
    }

    #[test]
    fn wrong_or_missing_token_is_rejected() {
        let cfg = config_with_secret("s3cret");
        assert!(!verify_request(&cfg, &headers_with_token("nope"), None));
        assert!(!verify_request(&cfg, &HeaderMap::new(), None));
    }

    #[test]
    fn empty_secret_disables_auth() {
        let cfg = config_with_secret("");
        assert!(verify_request(&cfg, &HeaderMap::new(), None));
    }

    #[test]
    fn trusted_prefix_bypasses_token() {
        let cfg = AppConfig {
            webhook_secret: "s3cret".to_string(),
            trusted_network_prefix: Some("10.0.".to_string()),
            ..AppConfig::default()
        };
        let trusted: SocketAddr = "10.0.3.7:1234".parse().expect("valid addr");
        let untrusted: SocketAddr = "203.0.113.9:1234".parse().expect("valid addr");

        assert!(verify_request(&cfg, &HeaderMap::new(), Some(trusted)));
        assert!(!verify_request(&cfg, &HeaderMap::new(), Some(untrusted)));
    }

    #[test]
    fn no_prefix_means_no_bypass() {
        let cfg = config_with_secret("s3cret");
        let peer: SocketAddr = "10.0.3.7:1234".parse().expect("valid addr");
        assert!(!verify_request(&cfg, &HeaderMap::new(), Some(peer)));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }
}
