//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Refuse fallback secrets in production
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Outside production, fallback secrets only produce a warning

use std::net::SocketAddr;

use crate::config::schema::{
    GatewayConfig, DEFAULT_API_KEYS, DEFAULT_CSRF_SECRET, DEFAULT_JWT_SECRET,
};

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is unset or uses the built-in fallback; set it before running in production")]
    InsecureSecret(&'static str),

    #[error("{field} is not a valid socket address: {value}")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("at least one API key must be configured")]
    NoApiKeys,

    #[error("{field} entry must start with '/': {value}")]
    RelativePath { field: &'static str, value: String },
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let security = &config.security;

    let insecure = insecure_secrets(config);
    if security.mode.is_production() {
        errors.extend(insecure.into_iter().map(ValidationError::InsecureSecret));
    } else {
        for name in insecure {
            tracing::warn!(secret = name, mode = ?security.mode, "Using built-in fallback secret");
        }
    }

    if security.api_keys.iter().all(|k| k.is_empty()) {
        errors.push(ValidationError::NoApiKeys);
    }

    for (field, value) in [
        ("listener.bind_address", &config.listener.bind_address),
        ("upstream.address", &config.upstream.address),
    ] {
        if value.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidAddress {
                field,
                value: value.clone(),
            });
        }
    }

    for (field, value) in [
        ("timeouts.request_secs", config.timeouts.request_secs),
        ("rate_limit.window_ms", config.rate_limit.window_ms),
        ("csrf.token_ttl_secs", config.csrf.token_ttl_secs),
        ("auth.token_ttl_secs", config.auth.token_ttl_secs),
    ] {
        if value == 0 {
            errors.push(ValidationError::Zero(field));
        }
    }
    if config.rate_limit.max_requests == 0 || config.rate_limit.public_max_requests == 0 {
        errors.push(ValidationError::Zero("rate_limit ceilings"));
    }

    let path_lists = [
        ("security.public_routes", &security.public_routes),
        ("security.asset_prefixes", &security.asset_prefixes),
        ("security.anonymous_api_prefixes", &security.anonymous_api_prefixes),
    ];
    for (field, list) in path_lists {
        for value in list.iter().filter(|p| !p.starts_with('/')) {
            errors.push(ValidationError::RelativePath {
                field,
                value: value.clone(),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Names of secrets that are empty or still carry a built-in value.
fn insecure_secrets(config: &GatewayConfig) -> Vec<&'static str> {
    let security = &config.security;
    let mut names = Vec::new();

    if security.jwt_secret.is_empty() || security.jwt_secret == DEFAULT_JWT_SECRET {
        names.push("JWT_SECRET");
    }
    if security.csrf_secret.is_empty() || security.csrf_secret == DEFAULT_CSRF_SECRET {
        names.push("CSRF_SECRET");
    }
    if security
        .api_keys
        .iter()
        .any(|k| DEFAULT_API_KEYS.contains(&k.as_str()))
    {
        names.push("PUBLIC_API_KEY");
    }

    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Mode;

    fn hardened() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.security.jwt_secret = "jwt-secret-from-vault".into();
        config.security.csrf_secret = "csrf-secret-from-vault".into();
        config.security.api_keys = vec!["prod-key".into()];
        config
    }

    #[test]
    fn test_production_rejects_fallback_secrets() {
        let config = GatewayConfig::default();
        let errors = validate_config(&config).unwrap_err();

        assert!(errors.contains(&ValidationError::InsecureSecret("JWT_SECRET")));
        assert!(errors.contains(&ValidationError::InsecureSecret("CSRF_SECRET")));
        assert!(errors.contains(&ValidationError::InsecureSecret("PUBLIC_API_KEY")));
    }

    #[test]
    fn test_development_allows_fallback_secrets() {
        let mut config = GatewayConfig::default();
        config.security.mode = Mode::Development;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_hardened_production_config_passes() {
        assert!(validate_config(&hardened()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = hardened();
        config.upstream.address = "not-an-address".into();
        config.rate_limit.window_ms = 0;
        config.security.public_routes.push("about".into());

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
