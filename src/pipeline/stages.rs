//! The gateway's pipeline stages, in execution order.

use std::sync::Arc;

use axum::http::{request::Parts, HeaderName, HeaderValue};
use axum::response::IntoResponse;

use super::{Flow, RequestContext, Stage};
use crate::http::request::{RequestId, X_REQUEST_ID};
use crate::http::response::{login_redirect, ApiError};
use crate::observability::metrics;
use crate::security::auth::{JwtAuthority, X_USER_ID, X_USER_ROLE};
use crate::security::csrf::CsrfService;
use crate::security::headers::X_CSP_NONCE;
use crate::security::nonce::CspNonce;
use crate::security::rate_limit::{RateLimiter, RouteClass};
use crate::security::routes::{route_segment, RouteClassifier};

const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");

/// Static files fetched with a safe method get security headers and nothing else.
pub struct StaticAssetStage {
    routes: Arc<RouteClassifier>,
}

impl StaticAssetStage {
    pub fn new(routes: Arc<RouteClassifier>) -> Self {
        Self { routes }
    }
}

impl Stage for StaticAssetStage {
    fn name(&self) -> &'static str {
        "static_assets"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        let path = parts.uri.path();
        if !CsrfService::requires_token(&parts.method) && self.routes.is_static_asset(path) {
            ctx.nonce = Some(CspNonce::new());
            Flow::Forward
        } else {
            Flow::Continue
        }
    }
}

/// Generates the CSP nonce and request id and hands both downstream.
pub struct SecurityHeaderStage;

impl Stage for SecurityHeaderStage {
    fn name(&self) -> &'static str {
        "security_headers"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        let nonce = CspNonce::new();
        let request_id = RequestId::new();

        if let Ok(value) = HeaderValue::from_str(nonce.value()) {
            parts.headers.insert(X_CSP_NONCE, value);
        }
        if let Ok(value) = HeaderValue::from_str(request_id.as_str()) {
            parts.headers.insert(X_REQUEST_ID, value);
        }
        parts.extensions.insert(nonce.clone());
        parts.extensions.insert(request_id.clone());

        ctx.nonce = Some(nonce);
        ctx.request_id = Some(request_id);
        Flow::Continue
    }
}

/// Public pages. Safe methods go straight through; state-changing ones
/// still have to pass the CSRF stage.
pub struct PublicRouteStage {
    routes: Arc<RouteClassifier>,
}

impl PublicRouteStage {
    pub fn new(routes: Arc<RouteClassifier>) -> Self {
        Self { routes }
    }
}

impl Stage for PublicRouteStage {
    fn name(&self) -> &'static str {
        "public_routes"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        if !self.routes.is_public(parts.uri.path()) {
            return Flow::Continue;
        }
        if CsrfService::requires_token(&parts.method) {
            ctx.public_route = true;
            Flow::Continue
        } else {
            Flow::Forward
        }
    }
}

/// Double-submit check for POST/PUT/PATCH/DELETE.
pub struct CsrfStage {
    csrf: Arc<CsrfService>,
}

impl CsrfStage {
    pub fn new(csrf: Arc<CsrfService>) -> Self {
        Self { csrf }
    }
}

impl Stage for CsrfStage {
    fn name(&self) -> &'static str {
        "csrf"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        if !CsrfService::requires_token(&parts.method) {
            return Flow::Continue;
        }

        if let Err(e) = self.csrf.check(&parts.headers, &ctx.body) {
            tracing::warn!(
                request_id = %ctx.request_id_str(),
                client = %ctx.client_ip,
                method = %parts.method,
                path = %parts.uri.path(),
                reason = %e,
                "CSRF validation failed"
            );
            metrics::record_csrf_rejected();
            return Flow::Respond(ApiError::InvalidCsrf.into_response());
        }

        if ctx.public_route {
            Flow::Forward
        } else {
            Flow::Continue
        }
    }
}

/// Static key match for API routes outside the anonymous namespace.
pub struct ApiKeyStage {
    routes: Arc<RouteClassifier>,
    keys: Vec<String>,
}

impl ApiKeyStage {
    pub fn new(routes: Arc<RouteClassifier>, keys: Vec<String>) -> Self {
        Self {
            routes,
            keys: keys.into_iter().filter(|k| !k.is_empty()).collect(),
        }
    }

    fn accepts(&self, key: Option<&str>) -> bool {
        key.map(|k| self.keys.iter().any(|valid| valid == k))
            .unwrap_or(false)
    }
}

impl Stage for ApiKeyStage {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        let path = parts.uri.path();
        if !self.routes.is_api(path) || self.routes.is_anonymous_api(path) {
            return Flow::Continue;
        }

        let key = parts.headers.get(X_API_KEY).and_then(|v| v.to_str().ok());
        if self.accepts(key) {
            Flow::Continue
        } else {
            tracing::warn!(
                request_id = %ctx.request_id_str(),
                client = %ctx.client_ip,
                path = %path,
                "Invalid or missing API key"
            );
            Flow::Respond(ApiError::InvalidApiKey.into_response())
        }
    }
}

/// Fixed-window limit for every API route.
pub struct RateLimitStage {
    routes: Arc<RouteClassifier>,
    limiter: RateLimiter,
}

impl RateLimitStage {
    pub fn new(routes: Arc<RouteClassifier>, limiter: RateLimiter) -> Self {
        Self { routes, limiter }
    }
}

impl Stage for RateLimitStage {
    fn name(&self) -> &'static str {
        "rate_limit"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        let path = parts.uri.path();
        if !self.routes.is_api(path) {
            return Flow::Continue;
        }

        let class = if self.routes.is_anonymous_api(path) {
            RouteClass::Public
        } else {
            RouteClass::Standard
        };
        let segment = route_segment(path);

        if self.limiter.check_and_increment(&ctx.client_ip, segment, class) {
            Flow::Continue
        } else {
            tracing::warn!(
                request_id = %ctx.request_id_str(),
                client = %ctx.client_ip,
                route = segment,
                "Rate limit exceeded"
            );
            metrics::record_rate_limited(segment);
            let retry_after_secs = self.limiter.window().as_secs().max(1);
            Flow::Respond(ApiError::RateLimited { retry_after_secs }.into_response())
        }
    }
}

/// Bearer token gate for protected pages and API routes.
pub struct AuthStage {
    routes: Arc<RouteClassifier>,
    auth: Arc<JwtAuthority>,
    login_path: String,
}

impl AuthStage {
    pub fn new(routes: Arc<RouteClassifier>, auth: Arc<JwtAuthority>, login_path: String) -> Self {
        Self {
            routes,
            auth,
            login_path,
        }
    }
}

impl Stage for AuthStage {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow {
        let path = parts.uri.path();
        if self.routes.is_anonymous_api(path) {
            return Flow::Forward;
        }

        match self.auth.authenticate(&parts.headers) {
            Ok(identity) => {
                if let Ok(value) = HeaderValue::from_str(&identity.user_id) {
                    parts.headers.insert(X_USER_ID, value);
                }
                if let Ok(value) = HeaderValue::from_str(&identity.role) {
                    parts.headers.insert(X_USER_ROLE, value);
                }
                parts.extensions.insert(identity.clone());
                ctx.identity = Some(identity);
                Flow::Forward
            }
            Err(e) => {
                tracing::warn!(
                    request_id = %ctx.request_id_str(),
                    client = %ctx.client_ip,
                    path = %path,
                    reason = %e,
                    "Authentication failed"
                );
                metrics::record_auth_failure(e.kind());

                if self.routes.is_api(path) {
                    Flow::Respond(ApiError::Unauthorized.into_response())
                } else {
                    let original = parts
                        .uri
                        .path_and_query()
                        .map(|pq| pq.as_str())
                        .unwrap_or(path);
                    Flow::Respond(login_redirect(&self.login_path, original))
                }
            }
        }
    }
}
