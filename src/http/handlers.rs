//! Endpoints served by the gateway itself.
//!
//! - `GET /api/csrf`: issue a CSRF token pair
//! - `POST /api/auth/login`: demo login, sets the `auth-token` cookie
//! - `POST /api/auth/logout`: clears the `auth-token` cookie

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};

use crate::http::response::ApiError;
use crate::http::server::AppState;
use crate::security::auth::AUTH_COOKIE;

#[derive(Debug, Serialize)]
pub struct CsrfTokenResponse {
    #[serde(rename = "tokenId")]
    pub token_id: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
    #[serde(rename = "callbackUrl")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    #[serde(rename = "userId")]
    pub user_id: String,
    #[serde(rename = "callbackUrl")]
    pub callback_url: String,
}

pub async fn issue_csrf_token(State(state): State<AppState>, jar: CookieJar) -> Response {
    match state.csrf.issue() {
        Ok(pair) => {
            let cookie = state.csrf.cookie(&pair);
            (
                jar.add(cookie),
                [(header::CACHE_CONTROL, "no-store, max-age=0")],
                Json(CsrfTokenResponse {
                    token_id: pair.token_id,
                }),
            )
                .into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "Error generating CSRF token");
            ApiError::TokenIssuance.into_response()
        }
    }
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Response {
    let auth_config = &state.config.auth;

    let email_matches = request.email.trim().eq_ignore_ascii_case(&auth_config.demo_email);
    if !email_matches || request.password != auth_config.demo_password {
        tracing::info!("Rejected login attempt");
        return ApiError::InvalidCredentials.into_response();
    }

    let token = match state
        .auth
        .issue(&auth_config.demo_user_id, None, auth_config.token_ttl_secs)
    {
        Ok(token) => token,
        Err(e) => {
            tracing::error!(error = %e, "Error signing auth token");
            return ApiError::Internal.into_response();
        }
    };

    let cookie = Cookie::build((AUTH_COOKIE, token))
        .http_only(true)
        .secure(state.config.security.mode.is_production())
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(time::Duration::seconds(auth_config.token_ttl_secs as i64))
        .build();

    let callback_url = safe_callback(request.callback_url.as_deref())
        .unwrap_or(auth_config.default_callback.as_str())
        .to_string();

    tracing::info!(user_id = %auth_config.demo_user_id, "Demo login succeeded");

    (
        jar.add(cookie),
        Json(LoginResponse {
            user_id: auth_config.demo_user_id.clone(),
            callback_url,
        }),
    )
        .into_response()
}

pub async fn logout(jar: CookieJar) -> impl IntoResponse {
    (
        jar.remove(Cookie::build(AUTH_COOKIE).path("/")),
        StatusCode::NO_CONTENT,
    )
}

/// Accept only same-origin relative paths as login callbacks.
fn safe_callback(callback: Option<&str>) -> Option<&str> {
    callback.filter(|c| c.starts_with('/') && !c.starts_with("//") && !c.contains('\\'))
}
