//! Per-request security pipeline.
//!
//! # Data Flow
//! ```text
//! Request
//!     → reject non-canonical paths (400)
//!     → buffer body (state-changing methods only)
//!     → StaticAssets   ─ safe + asset?     → forward
//!     → SecurityHeaders  (nonce, request id)
//!     → PublicRoutes   ─ public + safe?    → forward
//!     → Csrf           ─ invalid?          → 403   (public + unsafe → forward)
//!     → ApiKey         ─ bad key?          → 401
//!     → RateLimit      ─ over ceiling?     → 429
//!     → Auth           ─ no identity?      → 302 / 401, else forward
//!     → downstream handler or upstream
//!     → response decorated with security headers
//! ```
//!
//! # Design Decisions
//! - Stage order is data (`Vec<Box<dyn Stage>>`), not nested branches
//! - Stages are synchronous; the only I/O (body buffering) happens up front
//! - Nothing escapes a stage: every check ends in continue, forward or a response

pub mod stages;

use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{request::Parts, HeaderValue, Response},
    middleware::Next,
    response::IntoResponse,
};

use crate::config::GatewayConfig;
use crate::http::request::{client_ip, RequestId, X_REQUEST_ID};
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::security::auth::{Identity, JwtAuthority, X_USER_ID, X_USER_ROLE};
use crate::security::csrf::CsrfService;
use crate::security::headers::SecurityHeaders;
use crate::security::nonce::CspNonce;
use crate::security::rate_limit::RateLimiter;
use crate::security::routes::{is_canonical_path, RouteClassifier};

use self::stages::{
    ApiKeyStage, AuthStage, CsrfStage, PublicRouteStage, RateLimitStage, SecurityHeaderStage,
    StaticAssetStage,
};

/// What a stage decided.
pub enum Flow {
    /// Run the next stage.
    Continue,
    /// Skip remaining stages and hand the request downstream.
    Forward,
    /// Answer now; the request never reaches downstream.
    Respond(Response<Body>),
}

/// One step of the pipeline.
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn run(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Flow;
}

/// State carried between stages for a single request.
#[derive(Debug, Default)]
pub struct RequestContext {
    pub client_ip: String,
    /// Buffered body of a state-changing request; empty otherwise.
    pub body: Bytes,
    pub nonce: Option<CspNonce>,
    pub request_id: Option<RequestId>,
    pub identity: Option<Identity>,
    /// Set for state-changing requests to public routes, which only need CSRF.
    pub public_route: bool,
    /// Names of the stages that ran, in order.
    pub visited: Vec<&'static str>,
}

impl RequestContext {
    pub fn new(client_ip: String) -> Self {
        Self {
            client_ip,
            ..Default::default()
        }
    }

    pub fn request_id_str(&self) -> &str {
        self.request_id.as_ref().map(|r| r.as_str()).unwrap_or("-")
    }
}

/// Result of running every stage.
pub enum Outcome {
    Forward,
    Respond(Response<Body>),
}

/// Ordered stage list plus the response decoration applied afterwards.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
    headers: Arc<SecurityHeaders>,
    max_body_size: usize,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>, headers: Arc<SecurityHeaders>, max_body_size: usize) -> Self {
        Self {
            stages,
            headers,
            max_body_size,
        }
    }

    /// The gateway's stage order.
    pub fn standard(
        config: &GatewayConfig,
        csrf: Arc<CsrfService>,
        auth: Arc<JwtAuthority>,
        limiter: RateLimiter,
    ) -> Self {
        let security = &config.security;
        let routes = Arc::new(RouteClassifier::from_config(security));

        let mut stages: Vec<Box<dyn Stage>> = vec![
            Box::new(StaticAssetStage::new(routes.clone())),
            Box::new(SecurityHeaderStage),
            Box::new(PublicRouteStage::new(routes.clone())),
            Box::new(CsrfStage::new(csrf)),
            Box::new(ApiKeyStage::new(routes.clone(), security.api_keys.clone())),
        ];
        if config.rate_limit.enabled {
            stages.push(Box::new(RateLimitStage::new(routes.clone(), limiter)));
        }
        stages.push(Box::new(AuthStage::new(
            routes,
            auth,
            security.login_path.clone(),
        )));

        Self::new(
            stages,
            Arc::new(SecurityHeaders::new(security.mode)),
            security.max_body_size,
        )
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run the stages in order until one forwards or responds.
    pub fn evaluate(&self, parts: &mut Parts, ctx: &mut RequestContext) -> Outcome {
        for stage in &self.stages {
            ctx.visited.push(stage.name());
            match stage.run(parts, ctx) {
                Flow::Continue => continue,
                Flow::Forward => {
                    metrics::record_decision(stage.name(), "forward");
                    return Outcome::Forward;
                }
                Flow::Respond(response) => {
                    metrics::record_decision(stage.name(), "respond");
                    tracing::debug!(
                        request_id = %ctx.request_id_str(),
                        stage = stage.name(),
                        status = response.status().as_u16(),
                        "Request short-circuited"
                    );
                    return Outcome::Respond(response);
                }
            }
        }
        Outcome::Forward
    }

    /// Full middleware pass: buffer, evaluate, call downstream, decorate.
    pub async fn handle(&self, request: Request, next: Next) -> Response<Body> {
        let (mut parts, body) = request.into_parts();
        let mut ctx = RequestContext::new(client_ip(&parts));

        if !is_canonical_path(parts.uri.path()) {
            tracing::warn!(
                client = %ctx.client_ip,
                path = %parts.uri.path(),
                "Rejected non-canonical path"
            );
            metrics::record_decision("path_check", "respond");
            return self.reject(ApiError::InvalidPath, &mut ctx);
        }

        // Identity headers are only ever set by the auth stage.
        parts.headers.remove(X_USER_ID);
        parts.headers.remove(X_USER_ROLE);

        let body = if CsrfService::requires_token(&parts.method) {
            match axum::body::to_bytes(body, self.max_body_size).await {
                Ok(bytes) => {
                    ctx.body = bytes.clone();
                    Body::from(bytes)
                }
                Err(e) => {
                    tracing::warn!(client = %ctx.client_ip, error = %e, "Rejected request body");
                    return self.reject(ApiError::PayloadTooLarge, &mut ctx);
                }
            }
        } else {
            body
        };

        let mut response = match self.evaluate(&mut parts, &mut ctx) {
            Outcome::Forward => next.run(Request::from_parts(parts, body)).await,
            Outcome::Respond(response) => response,
        };

        self.decorate(&mut response, &ctx);
        response
    }

    /// Short-circuit before any stage ran; the response still gets the header set.
    fn reject(&self, error: ApiError, ctx: &mut RequestContext) -> Response<Body> {
        let mut response = error.into_response();
        ctx.nonce = Some(CspNonce::new());
        self.decorate(&mut response, ctx);
        response
    }

    /// Attach security, trace and identity headers to an outgoing response.
    pub fn decorate(&self, response: &mut Response<Body>, ctx: &RequestContext) {
        let headers = response.headers_mut();

        if let Some(nonce) = &ctx.nonce {
            self.headers.apply(nonce.value(), headers);
        }
        if let Some(id) = &ctx.request_id {
            if let Ok(value) = HeaderValue::from_str(id.as_str()) {
                headers.insert(X_REQUEST_ID, value);
            }
        }
        if let Some(identity) = &ctx.identity {
            if let Ok(value) = HeaderValue::from_str(&identity.user_id) {
                headers.insert(X_USER_ID, value);
            }
            if let Ok(value) = HeaderValue::from_str(&identity.role) {
                headers.insert(X_USER_ROLE, value);
            }
        }
    }
}

/// Axum middleware entry point.
pub async fn security_pipeline(
    State(pipeline): State<Arc<Pipeline>>,
    request: Request,
    next: Next,
) -> Response<Body> {
    pipeline.handle(request, next).await
}
