//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (Axum setup, middleware layers)
//!     → pipeline (security checks, see crate::pipeline)
//!     → handlers.rs (CSRF issuance, demo login/logout)
//!       or server.rs forward_to_upstream (site renderer)
//!     → response.rs (error bodies, login redirects)
//! ```

pub mod handlers;
pub mod request;
pub mod response;
pub mod server;

pub use request::{RequestId, X_REQUEST_ID};
pub use response::ApiError;
pub use server::{AppState, HttpServer};
