//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the gateway endpoints
//! - Wire up middleware (security pipeline, timeout, tracing)
//! - Bind server to listener, optionally over TLS
//! - Forward everything else to the upstream site renderer

use axum::{
    body::Body,
    extract::{Request, State},
    http::uri::{Authority, PathAndQuery, Scheme},
    http::Uri,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::schema::TlsConfig;
use crate::config::GatewayConfig;
use crate::http::handlers::{issue_csrf_token, login, logout};
use crate::http::request::RequestId;
use crate::http::response::ApiError;
use crate::observability::metrics;
use crate::pipeline::{security_pipeline, Pipeline};
use crate::security::auth::JwtAuthority;
use crate::security::csrf::CsrfService;
use crate::security::rate_limit::{MemoryStore, RateLimitStore, RateLimiter};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub csrf: Arc<CsrfService>,
    pub auth: Arc<JwtAuthority>,
    pub client: Client<HttpConnector, Body>,
    pub upstream: Option<Authority>,
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    pipeline: Arc<Pipeline>,
}

impl HttpServer {
    /// Create a server with a process-local rate limit store.
    pub fn new(config: GatewayConfig) -> Self {
        Self::with_store(config, Arc::new(MemoryStore::new()))
    }

    /// Create a server whose rate limiter counts in `store`.
    pub fn with_store(config: GatewayConfig, store: Arc<dyn RateLimitStore>) -> Self {
        let config = Arc::new(config);
        let security = &config.security;

        let csrf = Arc::new(CsrfService::new(
            &security.csrf_secret,
            config.csrf.token_ttl_secs,
            security.mode.is_production(),
        ));
        let auth = Arc::new(JwtAuthority::new(&security.jwt_secret));
        let limiter = RateLimiter::new(&config.rate_limit, store);
        let pipeline = Arc::new(Pipeline::standard(&config, csrf.clone(), auth.clone(), limiter));

        let upstream = Authority::from_str(&config.upstream.address).ok();
        if upstream.is_none() {
            tracing::error!(address = %config.upstream.address, "Invalid upstream address");
        }

        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        let state = AppState {
            config: config.clone(),
            csrf,
            auth,
            client,
            upstream,
        };

        let router = Self::build_router(&config, state, pipeline.clone());
        Self { router, pipeline }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &GatewayConfig, state: AppState, pipeline: Arc<Pipeline>) -> Router {
        Router::new()
            .route("/api/csrf", get(issue_csrf_token))
            .route("/api/auth/login", post(login))
            .route("/api/auth/logout", post(logout))
            .fallback(forward_to_upstream)
            .with_state(state)
            .layer(middleware::from_fn_with_state(pipeline, security_pipeline))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            stages = ?self.pipeline.stage_names(),
            "HTTP server starting"
        );

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Run the server over TLS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = crate::net::tls::load_tls_config(tls).await?;
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(10)));
        });

        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        tracing::info!("HTTPS server stopped");
        Ok(())
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Forward a request the pipeline let through to the site renderer.
async fn forward_to_upstream(State(state): State<AppState>, request: Request) -> Response {
    let start_time = Instant::now();
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map(|id| id.as_str().to_string())
        .unwrap_or_else(|| "-".to_string());

    let Some(authority) = state.upstream.clone() else {
        return ApiError::BadGateway.into_response();
    };

    let (mut parts, body) = request.into_parts();

    let mut uri_parts = parts.uri.clone().into_parts();
    uri_parts.scheme = Some(Scheme::HTTP);
    uri_parts.authority = Some(authority);
    if uri_parts.path_and_query.is_none() {
        uri_parts.path_and_query = Some(PathAndQuery::from_static("/"));
    }
    parts.uri = match Uri::from_parts(uri_parts) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Failed to build upstream URI");
            return ApiError::BadGateway.into_response();
        }
    };

    tracing::debug!(
        request_id = %request_id,
        method = %parts.method,
        uri = %parts.uri,
        "Forwarding request"
    );

    match state.client.request(Request::from_parts(parts, body)).await {
        Ok(response) => {
            metrics::record_upstream(response.status().as_u16(), start_time);
            let (parts, body) = response.into_parts();
            Response::from_parts(parts, Body::new(body))
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream error");
            metrics::record_upstream(502, start_time);
            ApiError::BadGateway.into_response()
        }
    }
}
