//! Request-side helpers.
//!
//! # Responsibilities
//! - Request ID extension and header
//! - Client address resolution for rate limiting and logs

use axum::extract::ConnectInfo;
use axum::http::{request::Parts, HeaderName};
use std::net::SocketAddr;
use std::sync::Arc;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

/// Per-request trace id, attached as an extension and as `X-Request-ID`.
#[derive(Clone, Debug)]
pub struct RequestId(pub Arc<str>);

impl RequestId {
    pub fn new() -> Self {
        Self(Arc::from(uuid::Uuid::new_v4().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Client address: first `X-Forwarded-For` hop, then the peer, then `unknown`.
pub fn client_ip(parts: &Parts) -> String {
    let forwarded = parts
        .headers
        .get(X_FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    if let Some(ip) = forwarded {
        return ip.to_string();
    }

    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_forwarded_for_first_hop() {
        let p = parts(Request::builder().header("x-forwarded-for", "203.0.113.7, 10.0.0.1"));
        assert_eq!(client_ip(&p), "203.0.113.7");
    }

    #[test]
    fn test_peer_address_fallback() {
        let mut p = parts(Request::builder());
        p.extensions
            .insert(ConnectInfo("192.0.2.1:5000".parse::<SocketAddr>().unwrap()));
        assert_eq!(client_ip(&p), "192.0.2.1");
    }

    #[test]
    fn test_unknown_client() {
        assert_eq!(client_ip(&parts(Request::builder())), "unknown");
    }
}
