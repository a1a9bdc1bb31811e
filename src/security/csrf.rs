//! CSRF protection using signed double-submit tokens.
//!
//! # Data Flow
//! ```text
//! GET /api/csrf:
//!     issue() → { token_id, token }
//!     token    → csrf_token cookie (HttpOnly, SameSite=Strict)
//!     token_id → JSON body, embedded by the page into later submissions
//!
//! POST/PUT/PATCH/DELETE:
//!     csrf_token cookie → verify signature + exp → tokenId
//!     x-csrf-token header | body.csrfToken      → submitted id
//!     tokenId == submitted id                    → accept
//! ```
//!
//! # Design Decisions
//! - Fail closed: any missing or unverifiable part rejects the request
//! - Tokens are reusable until they expire; validation never consumes them

use axum::http::{header, HeaderMap, Method};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::security::nonce::generate_nonce;

pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_BODY_FIELD: &str = "csrfToken";

/// Reasons a CSRF check fails.
#[derive(Debug, thiserror::Error)]
pub enum CsrfError {
    #[error("csrf cookie missing")]
    MissingCookie,

    #[error("csrf token missing from header and body")]
    MissingClientToken,

    #[error("csrf cookie rejected: {0}")]
    InvalidCookie(#[source] jsonwebtoken::errors::Error),

    #[error("submitted csrf token does not match cookie")]
    Mismatch,

    #[error("failed to sign csrf token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Claims carried by the signed cookie.
#[derive(Debug, Serialize, Deserialize)]
struct CsrfClaims {
    #[serde(rename = "tokenId")]
    token_id: String,
    iat: u64,
    exp: u64,
}

/// A freshly issued token pair.
#[derive(Debug, Clone)]
pub struct CsrfTokenPair {
    /// Client-visible id, submitted back in a header or body field.
    pub token_id: String,
    /// Signed credential stored in the `csrf_token` cookie.
    pub token: String,
}

#[derive(Deserialize)]
struct SubmittedBody {
    #[serde(rename = "csrfToken")]
    csrf_token: Option<String>,
}

/// Issues and validates CSRF token pairs.
#[derive(Clone)]
pub struct CsrfService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
    secure_cookie: bool,
}

impl CsrfService {
    pub fn new(secret: &str, ttl_secs: u64, secure_cookie: bool) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl_secs,
            secure_cookie,
        }
    }

    /// Issue a new pair valid from now.
    pub fn issue(&self) -> Result<CsrfTokenPair, CsrfError> {
        self.issue_at(jsonwebtoken::get_current_timestamp())
    }

    /// Issue a pair as if it had been created at `issued_at` (unix seconds).
    pub fn issue_at(&self, issued_at: u64) -> Result<CsrfTokenPair, CsrfError> {
        let token_id = generate_nonce();
        let claims = CsrfClaims {
            token_id: token_id.clone(),
            iat: issued_at,
            exp: issued_at + self.ttl_secs,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(CsrfError::Signing)?;

        Ok(CsrfTokenPair { token_id, token })
    }

    /// The `Set-Cookie` value carrying the signed half of `pair`.
    pub fn cookie(&self, pair: &CsrfTokenPair) -> Cookie<'static> {
        Cookie::build((CSRF_COOKIE, pair.token.clone()))
            .http_only(true)
            .secure(self.secure_cookie)
            .same_site(SameSite::Strict)
            .path("/")
            .max_age(time::Duration::seconds(self.ttl_secs as i64))
            .build()
    }

    /// True when `method` changes state and therefore needs a token.
    pub fn requires_token(method: &Method) -> bool {
        matches!(
            *method,
            Method::POST | Method::PUT | Method::PATCH | Method::DELETE
        )
    }

    /// Validate a request's double submission. Fails closed.
    pub fn validate(&self, headers: &HeaderMap, body: &[u8]) -> bool {
        match self.check(headers, body) {
            Ok(()) => true,
            Err(e) => {
                tracing::debug!(error = %e, "CSRF validation failed");
                false
            }
        }
    }

    /// Same as [`validate`](Self::validate), reporting why a request failed.
    pub fn check(&self, headers: &HeaderMap, body: &[u8]) -> Result<(), CsrfError> {
        let jar = CookieJar::from_headers(headers);
        let cookie = jar.get(CSRF_COOKIE).ok_or(CsrfError::MissingCookie)?;

        let submitted = submitted_token(headers, body).ok_or(CsrfError::MissingClientToken)?;

        let data = decode::<CsrfClaims>(cookie.value(), &self.decoding, &self.validation)
            .map_err(CsrfError::InvalidCookie)?;

        if data.claims.token_id == submitted {
            Ok(())
        } else {
            Err(CsrfError::Mismatch)
        }
    }
}

/// Client-submitted token id: header first, then the request body.
fn submitted_token(headers: &HeaderMap, body: &[u8]) -> Option<String> {
    if let Some(value) = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        return Some(value.to_string());
    }

    if body.is_empty() {
        return None;
    }

    let is_form = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);

    if is_form {
        url::form_urlencoded::parse(body)
            .find(|(k, _)| k == CSRF_BODY_FIELD)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    } else {
        serde_json::from_slice::<SubmittedBody>(body)
            .ok()
            .and_then(|b| b.csrf_token)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn service() -> CsrfService {
        CsrfService::new("test-csrf-secret", 3600, false)
    }

    fn headers_with(cookie: &str, submitted: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_str(&format!("{CSRF_COOKIE}={cookie}")).unwrap(),
        );
        if let Some(value) = submitted {
            headers.insert(CSRF_HEADER, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn test_matching_header_validates_repeatedly() {
        let csrf = service();
        let pair = csrf.issue().unwrap();
        let headers = headers_with(&pair.token, Some(&pair.token_id));

        assert!(csrf.validate(&headers, b""));
        assert!(csrf.validate(&headers, b""));
    }

    #[test]
    fn test_json_body_fallback() {
        let csrf = service();
        let pair = csrf.issue().unwrap();
        let headers = headers_with(&pair.token, None);
        let body = format!(r#"{{"name":"Ada","csrfToken":"{}"}}"#, pair.token_id);

        assert!(csrf.validate(&headers, body.as_bytes()));
    }

    #[test]
    fn test_form_body_fallback() {
        let csrf = service();
        let pair = csrf.issue().unwrap();
        let mut headers = headers_with(&pair.token, None);
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/x-www-form-urlencoded"),
        );
        let body = format!("name=Ada&csrfToken={}", pair.token_id);

        assert!(csrf.validate(&headers, body.as_bytes()));
    }

    #[test]
    fn test_tampered_id_rejected() {
        let csrf = service();
        let pair = csrf.issue().unwrap();
        let headers = headers_with(&pair.token, Some("tampered"));

        assert!(matches!(csrf.check(&headers, b""), Err(CsrfError::Mismatch)));
    }

    #[test]
    fn test_missing_parts_rejected() {
        let csrf = service();
        let pair = csrf.issue().unwrap();

        let mut no_cookie = HeaderMap::new();
        no_cookie.insert(CSRF_HEADER, HeaderValue::from_str(&pair.token_id).unwrap());
        assert!(matches!(csrf.check(&no_cookie, b""), Err(CsrfError::MissingCookie)));

        let no_submission = headers_with(&pair.token, None);
        assert!(matches!(
            csrf.check(&no_submission, b"not json"),
            Err(CsrfError::MissingClientToken)
        ));
    }

    #[test]
    fn test_foreign_signature_rejected() {
        let other = CsrfService::new("another-secret", 3600, false);
        let pair = other.issue().unwrap();
        let headers = headers_with(&pair.token, Some(&pair.token_id));

        assert!(matches!(
            service().check(&headers, b""),
            Err(CsrfError::InvalidCookie(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let csrf = service();
        let two_hours_ago = jsonwebtoken::get_current_timestamp() - 7200;
        let pair = csrf.issue_at(two_hours_ago).unwrap();
        let headers = headers_with(&pair.token, Some(&pair.token_id));

        assert!(!csrf.validate(&headers, b""));
    }

    #[test]
    fn test_cookie_attributes() {
        let csrf = CsrfService::new("s", 3600, true);
        let pair = csrf.issue().unwrap();
        let rendered = csrf.cookie(&pair).to_string();

        assert!(rendered.starts_with("csrf_token="));
        assert!(rendered.contains("HttpOnly"));
        assert!(rendered.contains("SameSite=Strict"));
        assert!(rendered.contains("Secure"));
        assert!(rendered.contains("Path=/"));
        assert!(rendered.contains("Max-Age=3600"));
    }

    #[test]
    fn test_safe_methods_exempt() {
        assert!(!CsrfService::requires_token(&Method::GET));
        assert!(!CsrfService::requires_token(&Method::HEAD));
        assert!(CsrfService::requires_token(&Method::POST));
        assert!(CsrfService::requires_token(&Method::PATCH));
        assert!(CsrfService::requires_token(&Method::DELETE));
    }
}
