//! Response construction for short-circuited requests.
//!
//! # Design Decisions
//! - Every error body is `{"error": "<message>"}` with a fixed message per variant
//! - Internal causes are logged where they happen, never echoed to the client

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Errors surfaced to clients by the pipeline and the gateway endpoints.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid request path")]
    InvalidPath,

    #[error("Invalid CSRF token")]
    InvalidCsrf,

    #[error("Invalid or missing API key")]
    InvalidApiKey,

    #[error("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[error("Invalid or expired token")]
    Unauthorized,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Request body too large")]
    PayloadTooLarge,

    #[error("Failed to generate CSRF token")]
    TokenIssuance,

    #[error("Internal server error")]
    Internal,

    #[error("Upstream request failed")]
    BadGateway,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InvalidPath => StatusCode::BAD_REQUEST,
            ApiError::InvalidCsrf => StatusCode::FORBIDDEN,
            ApiError::InvalidApiKey | ApiError::Unauthorized | ApiError::InvalidCredentials => {
                StatusCode::UNAUTHORIZED
            }
            ApiError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TokenIssuance | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::BadGateway => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut response =
            (self.status_code(), Json(json!({ "error": self.to_string() }))).into_response();

        if let ApiError::RateLimited { retry_after_secs } = self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
        }
        response
    }
}

/// `302 Found` to `login_path`, preserving where the caller was going.
///
/// Only the path and query of the original request are kept, so the callback
/// can never point at another origin.
pub fn login_redirect(login_path: &str, original: &str) -> Response {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair("callbackUrl", original)
        .finish();
    let location = format!("{login_path}?{query}");

    match HeaderValue::from_str(&location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => ApiError::Internal.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_error_body_shape() {
        let response = ApiError::InvalidCsrf.into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({ "error": "Invalid CSRF token" }));
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = ApiError::RateLimited { retry_after_secs: 60 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "60");
    }

    #[test]
    fn test_login_redirect_encodes_callback() {
        let response = login_redirect("/login", "/dashboard?tab=billing");
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers()[header::LOCATION],
            "/login?callbackUrl=%2Fdashboard%3Ftab%3Dbilling"
        );
    }
}
