//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    http::{HeaderMap, Method, Uri},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use site_gateway::config::{GatewayConfig, Mode};
use site_gateway::security::auth::JwtAuthority;
use site_gateway::security::csrf::CsrfService;

pub const JWT_SECRET: &str = "integration-jwt-secret";
pub const CSRF_SECRET: &str = "integration-csrf-secret";
pub const API_KEY: &str = "integration-api-key";

/// Start a mock site renderer that echoes what the gateway forwarded.
///
/// The JSON body carries the method, path and query plus the headers the
/// pipeline injects (`x-user-id`, `x-user-role`, `x-csp-nonce`, `x-request-id`).
pub async fn start_echo_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let app = Router::new().fallback(echo);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    addr
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap) -> Json<Value> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };

    Json(json!({
        "method": method.as_str(),
        "path": uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/"),
        "userId": header("x-user-id"),
        "role": header("x-user-role"),
        "nonce": header("x-csp-nonce"),
        "requestId": header("x-request-id"),
    }))
}

/// Gateway config with known secrets, pointed at `upstream`.
pub fn test_config(upstream: SocketAddr) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.security.mode = Mode::Test;
    config.security.jwt_secret = JWT_SECRET.into();
    config.security.csrf_secret = CSRF_SECRET.into();
    config.security.api_keys = vec![API_KEY.into()];
    config.upstream.address = upstream.to_string();
    config.observability.metrics_enabled = false;
    config
}

/// Bearer token signed with [`JWT_SECRET`].
pub fn mint_token(user_id: &str, role: Option<&str>) -> String {
    JwtAuthority::new(JWT_SECRET)
        .issue(user_id, role, 3600)
        .unwrap()
}

/// Token whose expiry is already in the past.
pub fn mint_expired_token(user_id: &str) -> String {
    let now = jsonwebtoken::get_current_timestamp();
    JwtAuthority::new(JWT_SECRET)
        .issue_at(user_id, None, now - 7200, now - 3600)
        .unwrap()
}

/// `(token_id, signed cookie value)` for [`CSRF_SECRET`].
pub fn mint_csrf_pair() -> (String, String) {
    let pair = CsrfService::new(CSRF_SECRET, 3600, false).issue().unwrap();
    (pair.token_id, pair.token)
}

/// Extract `name=value` for `name` from a response's `Set-Cookie` headers.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find_map(|pair| {
            let (k, v) = pair.split_once('=')?;
            (k.trim() == name).then(|| v.trim().to_string())
        })
}

/// Give a freshly spawned listener a moment before the first request.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}
