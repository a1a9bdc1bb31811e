//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use crate::config::schema::{GatewayConfig, Mode, DEFAULT_API_KEYS};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, overlay the process
/// environment, then validate.
pub fn load_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let config = read_config(path)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Parse and overlay the environment without validating.
///
/// Lets the binary install logging from the config before validation warns.
pub fn read_config(path: Option<&Path>) -> Result<GatewayConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => GatewayConfig::default(),
    };

    apply_env(&mut config, |key| std::env::var(key).ok());
    Ok(config)
}

/// Overlay environment variables onto a configuration.
///
/// `lookup` returns the value of a variable, or `None` when it is unset or empty.
pub fn apply_env<F>(config: &mut GatewayConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let lookup = |key: &str| lookup(key).filter(|v| !v.is_empty());

    if let Some(mode) = lookup("NODE_ENV") {
        config.security.mode = Mode::from_env_value(&mode);
    }
    if let Some(secret) = lookup("JWT_SECRET") {
        config.security.jwt_secret = secret;
    }
    if let Some(secret) = lookup("CSRF_SECRET") {
        config.security.csrf_secret = secret;
    }
    if let Some(key) = lookup("PUBLIC_API_KEY") {
        // The env key supersedes the built-in keys; operator-configured keys stay.
        let keys = &mut config.security.api_keys;
        keys.retain(|k| !DEFAULT_API_KEYS.contains(&k.as_str()) && *k != key);
        keys.insert(0, key);
    }
    if let Some(addr) = lookup("GATEWAY_BIND") {
        config.listener.bind_address = addr;
    }
    if let Some(addr) = lookup("GATEWAY_UPSTREAM") {
        config.upstream.address = addr;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_env_overrides_secrets_and_mode() {
        let vars = env(&[
            ("NODE_ENV", "development"),
            ("JWT_SECRET", "jwt"),
            ("CSRF_SECRET", "csrf"),
            ("PUBLIC_API_KEY", "key-from-env"),
        ]);
        let mut config = GatewayConfig::default();
        apply_env(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.security.mode, Mode::Development);
        assert_eq!(config.security.jwt_secret, "jwt");
        assert_eq!(config.security.csrf_secret, "csrf");
        assert_eq!(config.security.api_keys, vec!["key-from-env".to_string()]);
    }

    #[test]
    fn test_env_only_production_config_validates() {
        let vars = env(&[
            ("NODE_ENV", "production"),
            ("JWT_SECRET", "jwt-from-vault"),
            ("CSRF_SECRET", "csrf-from-vault"),
            ("PUBLIC_API_KEY", "real-key"),
        ]);
        let mut config = GatewayConfig::default();
        apply_env(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.security.mode, Mode::Production);
        assert_eq!(config.security.api_keys, vec!["real-key".to_string()]);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_env_key_keeps_configured_keys() {
        let vars = env(&[("PUBLIC_API_KEY", "real-key")]);
        let mut config = GatewayConfig::default();
        config.security.api_keys = vec!["partner-key".into(), "test-api-key-2".into()];
        apply_env(&mut config, |k| vars.get(k).cloned());

        assert_eq!(
            config.security.api_keys,
            vec!["real-key".to_string(), "partner-key".to_string()]
        );
    }

    #[test]
    fn test_empty_env_values_are_ignored() {
        let vars = env(&[("JWT_SECRET", "")]);
        let mut config = GatewayConfig::default();
        let before = config.security.jwt_secret.clone();
        apply_env(&mut config, |k| vars.get(k).cloned());

        assert_eq!(config.security.jwt_secret, before);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config(Some(Path::new("/nonexistent/gateway.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
