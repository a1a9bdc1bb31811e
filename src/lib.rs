//! Security gateway for the company website.
//!
//! Every request passes through [`pipeline::Pipeline`]: CSP nonce and
//! hardening headers, CSRF double-submit validation, API key checks,
//! fixed-window rate limiting and bearer token gating. Requests that pass are
//! served by the gateway's own endpoints or forwarded to the site renderer.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod pipeline;
pub mod security;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use pipeline::Pipeline;
