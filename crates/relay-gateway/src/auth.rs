//! App-level bearer authentication and caller identity

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use relay_core::RelayError;
use std::net::SocketAddr;
use tracing::warn;

const FORWARDED_FOR: &str = "x-forwarded-for";
const UNKNOWN_CLIENT: &str = "unknown";

/// Check `Authorization: Bearer <token>` against the configured app token.
///
/// When no token is configured every request is allowed.
pub fn authorize(headers: &HeaderMap, expected: Option<&str>) -> Result<(), RelayError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    let provided = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or("");

    if constant_time_eq(provided.as_bytes(), expected.as_bytes()) {
        Ok(())
    } else {
        warn!("Rejected request with missing or invalid app token");
        Err(RelayError::Unauthorized)
    }
}

/// Byte comparison whose running time does not depend on where inputs differ
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Identify the caller for rate limiting: first `X-Forwarded-For` hop, then
/// the socket peer, then a fixed fallback.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let forwarded = headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (forwarded, peer) {
        (Some(ip), _) => ip.to_string(),
        (None, Some(addr)) => addr.ip().to_string(),
        (None, None) => UNKNOWN_CLIENT.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_no_token_configured_allows_all() {
        assert!(authorize(&HeaderMap::new(), None).is_ok());
        assert!(authorize(&headers(&[("authorization", "Bearer anything")]), None).is_ok());
    }

    #[test]
    fn test_matching_token() {
        let h = headers(&[("authorization", "Bearer secret")]);
        assert!(authorize(&h, Some("secret")).is_ok());
    }

    #[test]
    fn test_wrong_or_missing_token() {
        let wrong = headers(&[("authorization", "Bearer wrong")]);
        assert!(matches!(
            authorize(&wrong, Some("secret")),
            Err(RelayError::Unauthorized)
        ));
        assert!(authorize(&HeaderMap::new(), Some("secret")).is_err());
        assert!(authorize(&headers(&[("authorization", "secret")]), Some("secret")).is_err());
        assert!(authorize(&headers(&[("authorization", "Basic secret")]), Some("secret")).is_err());
        assert!(authorize(&headers(&[("authorization", "Bearer secre")]), Some("secret")).is_err());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"ab"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_identity_prefers_forwarded_for() {
        let h = headers(&[("x-forwarded-for", " 203.0.113.7 , 10.0.0.1")]);
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        assert_eq!(client_identity(&h, Some(peer)), "203.0.113.7");
    }

    #[test]
    fn test_identity_falls_back_to_peer_then_unknown() {
        let peer: SocketAddr = "192.168.1.2:5000".parse().unwrap();
        assert_eq!(client_identity(&HeaderMap::new(), Some(peer)), "192.168.1.2");
        assert_eq!(client_identity(&HeaderMap::new(), None), "unknown");
        assert_eq!(
            client_identity(&headers(&[("x-forwarded-for", " ")]), None),
            "unknown"
        );
    }
}
