//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → loader.rs (overlay NODE_ENV, JWT_SECRET, CSRF_SECRET, PUBLIC_API_KEY, ...)
//!     → validation.rs (semantic checks, secret hygiene)
//!     → GatewayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, read_config, ConfigError};
pub use validation::validate_config;
pub use schema::{
    AuthConfig, CsrfConfig, GatewayConfig, ListenerConfig, Mode, RateLimitConfig,
    SecurityConfig, UpstreamConfig,
};
