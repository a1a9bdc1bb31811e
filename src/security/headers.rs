//! Security response headers.
//!
//! # Responsibilities
//! - Compose the Content-Security-Policy template once per mode
//! - Substitute a fresh nonce into `script-src` per request
//! - Attach the fixed hardening headers
//!
//! # Design Decisions
//! - The template is built at startup; per-request work is one string replace
//! - Development adds `'unsafe-eval'` for hot reloading; production never does

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::config::Mode;

pub const X_CSP_NONCE: HeaderName = HeaderName::from_static("x-csp-nonce");

const NONCE_PLACEHOLDER: &str = "'nonce-PLACEHOLDER'";

const SCRIPT_ORIGINS: &str = "https://cdnjs.cloudflare.com https://cdn.amplitude.com \
https://amplitude.com https://www.googletagmanager.com https://www.google-analytics.com \
https://widget.clutch.co https://assets.goodfirms.co https://images.dmca.com https://*.dmca.com";

const FIXED_HEADERS: [(&str, &str); 6] = [
    (
        "strict-transport-security",
        "max-age=63072000; includeSubDomains; preload",
    ),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-xss-protection", "1; mode=block"),
    ("referrer-policy", "strict-origin-when-cross-origin"),
    ("permissions-policy", "camera=(), microphone=(), geolocation=()"),
];

/// Header set composer, built once per process.
#[derive(Debug, Clone)]
pub struct SecurityHeaders {
    csp_template: String,
}

impl SecurityHeaders {
    pub fn new(mode: Mode) -> Self {
        let script_src = if mode.is_development() {
            format!("'self' {NONCE_PLACEHOLDER} 'unsafe-eval' {SCRIPT_ORIGINS}")
        } else {
            format!("'self' {NONCE_PLACEHOLDER} {SCRIPT_ORIGINS}")
        };

        let directives = [
            "default-src 'self'".to_string(),
            format!("script-src {script_src}"),
            "style-src 'self' 'unsafe-inline' https://fonts.googleapis.com".to_string(),
            "font-src 'self' https://fonts.gstatic.com".to_string(),
            "img-src 'self' data: blob: https://*.solvejet.net https://*.clutch.co \
             https://*.goodfirms.co https://www.google-analytics.com \
             https://www.googletagmanager.com https://images.dmca.com https://*.dmca.com"
                .to_string(),
            "connect-src 'self' https://*.solvejet.net https://api.solvejet.net \
             https://*.clutch.co https://*.goodfirms.co https://cdn.amplitude.com \
             https://amplitude.com https://www.google-analytics.com \
             https://www.googletagmanager.com https://images.dmca.com https://*.dmca.com"
                .to_string(),
            "frame-src 'self' https://*.clutch.co https://*.goodfirms.co \
             https://widget.clutch.co https://widget.goodfirms.co https://images.dmca.com \
             https://*.dmca.com"
                .to_string(),
            "object-src 'none'".to_string(),
            "base-uri 'self'".to_string(),
            "form-action 'self'".to_string(),
            "frame-ancestors 'self'".to_string(),
            "upgrade-insecure-requests".to_string(),
        ];

        Self {
            csp_template: format!("{};", directives.join("; ")),
        }
    }

    /// CSP value with `nonce` substituted for every placeholder.
    pub fn content_security_policy(&self, nonce: &str) -> String {
        self.csp_template
            .replace(NONCE_PLACEHOLDER, &format!("'nonce-{nonce}'"))
    }

    /// Write the full header set, including `X-CSP-Nonce`, into `headers`.
    ///
    /// Existing values for the same names are replaced.
    pub fn apply(&self, nonce: &str, headers: &mut HeaderMap) {
        if let Ok(csp) = HeaderValue::from_str(&self.content_security_policy(nonce)) {
            headers.insert(axum::http::header::CONTENT_SECURITY_POLICY, csp);
        }
        if let Ok(value) = HeaderValue::from_str(nonce) {
            headers.insert(X_CSP_NONCE, value);
        }
        for (name, value) in FIXED_HEADERS {
            headers.insert(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_substituted_into_script_src() {
        let headers = SecurityHeaders::new(Mode::Production);
        let csp = headers.content_security_policy("abc123");

        assert!(csp.contains("script-src 'self' 'nonce-abc123' https://cdnjs.cloudflare.com"));
        assert!(!csp.contains("PLACEHOLDER"));
        assert!(!csp.contains("unsafe-eval"));
        assert!(csp.starts_with("default-src 'self'; "));
        assert!(csp.ends_with("upgrade-insecure-requests;"));
    }

    #[test]
    fn test_development_allows_unsafe_eval() {
        let csp = SecurityHeaders::new(Mode::Development).content_security_policy("n");
        assert!(csp.contains("'nonce-n' 'unsafe-eval'"));
    }

    #[test]
    fn test_apply_sets_full_header_set() {
        let composer = SecurityHeaders::new(Mode::Production);
        let mut headers = HeaderMap::new();
        composer.apply("xyz", &mut headers);

        assert_eq!(headers["x-csp-nonce"], "xyz");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-xss-protection"], "1; mode=block");
        assert_eq!(headers["referrer-policy"], "strict-origin-when-cross-origin");
        assert_eq!(
            headers["strict-transport-security"],
            "max-age=63072000; includeSubDomains; preload"
        );
        assert_eq!(
            headers["permissions-policy"],
            "camera=(), microphone=(), geolocation=()"
        );
        assert!(headers["content-security-policy"]
            .to_str()
            .unwrap()
            .contains("'nonce-xyz'"));
    }
}
