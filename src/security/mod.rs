//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request (driven by the pipeline):
//!     → routes.rs (static asset / public / API classification)
//!     → nonce.rs + headers.rs (CSP nonce, hardening headers)
//!     → csrf.rs (double-submit check on state-changing methods)
//!     → rate_limit.rs (fixed window per client and API segment)
//!     → auth.rs (bearer token → Identity)
//! ```
//!
//! # Design Decisions
//! - Fail closed: reject on any security check failure
//! - No trust in client input; identity headers are only set after verification
//! - Secrets and stores are injected, never module-level singletons

pub mod auth;
pub mod csrf;
pub mod headers;
pub mod nonce;
pub mod rate_limit;
pub mod routes;
