//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Fallback JWT secret used when `JWT_SECRET` is unset. Rejected in production.
pub const DEFAULT_JWT_SECRET: &str = "default_jwt_secret_replace_this_in_production";

/// Fallback CSRF secret used when `CSRF_SECRET` is unset. Rejected in production.
pub const DEFAULT_CSRF_SECRET: &str = "csrf_secret_replace_this_in_production";

/// Built-in API keys used when `PUBLIC_API_KEY` is unset. Rejected in production.
pub const DEFAULT_API_KEYS: [&str; 2] = ["test-api-key-1", "test-api-key-2"];

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Site renderer that receives requests the pipeline lets through.
    pub upstream: UpstreamConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Secrets, route classes and request limits.
    pub security: SecurityConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// CSRF token settings.
    pub csrf: CsrfConfig,

    /// Bearer token and demo login settings.
    pub auth: AuthConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment mode, normally taken from `NODE_ENV`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Production,
    Development,
    Test,
}

impl Mode {
    /// Parse a `NODE_ENV` style value. Unknown values map to production.
    pub fn from_env_value(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Mode::Development,
            "test" => Mode::Test,
            _ => Mode::Production,
        }
    }

    pub fn is_production(self) -> bool {
        self == Mode::Production
    }

    pub fn is_development(self) -> bool {
        self == Mode::Development
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Upstream site renderer.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Renderer address (e.g., "127.0.0.1:3000").
    pub address: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Security configuration: secrets and route classification.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Deployment mode. Controls CSP strictness and the `Secure` cookie flag.
    pub mode: Mode,

    /// HS256 secret for bearer tokens.
    pub jwt_secret: String,

    /// HS256 secret for CSRF cookies.
    pub csrf_secret: String,

    /// Accepted values for the `x-api-key` header.
    pub api_keys: Vec<String>,

    /// Paths (and their sub-paths) that skip CSRF, API key, rate limit and auth.
    pub public_routes: Vec<String>,

    /// Path prefixes served as static assets.
    pub asset_prefixes: Vec<String>,

    /// API prefixes that need neither an API key nor a bearer token.
    pub anonymous_api_prefixes: Vec<String>,

    /// Login page unauthenticated page requests are redirected to.
    pub login_path: String,

    /// Maximum buffered body size in bytes for state-changing requests.
    pub max_body_size: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            csrf_secret: DEFAULT_CSRF_SECRET.to_string(),
            api_keys: DEFAULT_API_KEYS.iter().map(|k| k.to_string()).collect(),
            public_routes: default_public_routes(),
            asset_prefixes: ["/_next", "/icons", "/images", "/fonts", "/favicon.ico"]
                .iter()
                .map(|p| p.to_string())
                .collect(),
            anonymous_api_prefixes: vec!["/api/public".to_string()],
            login_path: "/login".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
        }
    }
}

fn default_public_routes() -> Vec<String> {
    [
        "/",
        "/about",
        "/contact",
        "/blog",
        "/offline",
        "/sitemap",
        "/login",
        "/learn-more",
        "/get-started",
        "/what-we-do",
        "/industries",
        "/methodology",
        "/case-studies",
        "/api/csrf",
        "/api/auth",
        "/api/placeholder",
    ]
    .iter()
    .map(|r| r.to_string())
    .collect()
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Fixed window length in milliseconds.
    pub window_ms: u64,

    /// Ceiling per window for the anonymous (public) API namespace.
    pub public_max_requests: u32,

    /// Ceiling per window for every other API route.
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            window_ms: 60_000,
            public_max_requests: 100,
            max_requests: 50,
        }
    }
}

/// CSRF token configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CsrfConfig {
    /// Token lifetime in seconds. Also used as the cookie max-age.
    pub token_ttl_secs: u64,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 3600,
        }
    }
}

/// Bearer token and demo login configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Lifetime of tokens minted by the login endpoint, in seconds.
    pub token_ttl_secs: u64,

    /// Demo account accepted by the login endpoint.
    pub demo_email: String,
    pub demo_password: String,
    pub demo_user_id: String,

    /// Where the login endpoint sends the browser when no callback was given.
    pub default_callback: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_ttl_secs: 3600,
            demo_email: "demo@solvejet.net".to_string(),
            demo_password: "password123".to_string(),
            demo_user_id: "123".to_string(),
            default_callback: "/dashboard".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log filter used when `RUST_LOG` is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "site_gateway=debug,tower_http=debug".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_env_value() {
        assert_eq!(Mode::from_env_value("development"), Mode::Development);
        assert_eq!(Mode::from_env_value("Production"), Mode::Production);
        assert_eq!(Mode::from_env_value("test"), Mode::Test);
        assert_eq!(Mode::from_env_value("staging"), Mode::Production);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [security]
            mode = "development"

            [rate_limit]
            max_requests = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.security.mode, Mode::Development);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(config.rate_limit.public_max_requests, 100);
        assert_eq!(config.csrf.token_ttl_secs, 3600);
        assert!(config.security.public_routes.contains(&"/contact".to_string()));
    }
}
