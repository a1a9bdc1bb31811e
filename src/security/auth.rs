//! Bearer token authentication for protected routes.

use axum::http::{header, HeaderMap, HeaderName};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const AUTH_COOKIE: &str = "auth-token";
pub const X_USER_ID: HeaderName = HeaderName::from_static("x-user-id");
pub const X_USER_ROLE: HeaderName = HeaderName::from_static("x-user-role");

/// Role reported when a token carries none.
pub const DEFAULT_ROLE: &str = "user";

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("no bearer token in cookie or Authorization header")]
    MissingToken,

    #[error("token rejected: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("token expired")]
    Expired,

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

impl AuthError {
    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::MissingToken => "missing",
            AuthError::Invalid(_) => "invalid",
            AuthError::Expired => "expired",
            AuthError::Signing(_) => "signing",
        }
    }
}

/// `userId` is a string in tokens we mint, but numeric ids are accepted too.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum UserId {
    Text(String),
    Number(i64),
}

impl UserId {
    fn into_string(self) -> String {
        match self {
            UserId::Text(s) => s,
            UserId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    #[serde(rename = "userId")]
    user_id: UserId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<u64>,
    exp: u64,
}

/// Authenticated caller, attached to requests as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: String,
    pub role: String,
}

/// Signs and verifies HS256 bearer tokens.
#[derive(Clone)]
pub struct JwtAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl JwtAuthority {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Mint a token for `user_id` valid for `ttl_secs`.
    pub fn issue(&self, user_id: &str, role: Option<&str>, ttl_secs: u64) -> Result<String, AuthError> {
        let now = jsonwebtoken::get_current_timestamp();
        self.issue_at(user_id, role, now, now + ttl_secs)
    }

    /// Mint a token with explicit `iat`/`exp` (unix seconds).
    pub fn issue_at(
        &self,
        user_id: &str,
        role: Option<&str>,
        issued_at: u64,
        expires_at: u64,
    ) -> Result<String, AuthError> {
        let claims = Claims {
            user_id: UserId::Text(user_id.to_string()),
            role: role.map(str::to_string),
            iat: Some(issued_at),
            exp: expires_at,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding).map_err(AuthError::Signing)
    }

    /// Find and verify the caller's token.
    pub fn authenticate(&self, headers: &HeaderMap) -> Result<Identity, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingToken)?;
        self.verify(&token)
    }

    /// Verify a raw token string.
    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::Expired,
                _ => AuthError::Invalid(e),
            }
        })?;

        // Checked again here so expiry never depends on library defaults.
        if data.claims.exp < jsonwebtoken::get_current_timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(Identity {
            user_id: data.claims.user_id.into_string(),
            role: data
                .claims
                .role
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| DEFAULT_ROLE.to_string()),
        })
    }
}

/// Token from the `auth-token` cookie, else from `Authorization: Bearer`.
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(AUTH_COOKIE).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
