//! HTTP Basic authentication
//!
//! Applied to every route except `/health`. Credentials are compared in
//! constant time.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use subtle::ConstantTimeEq;

use super::config::{AuthConfig, AuthMode};
use super::version_routes::ErrorResponse;
use crate::observability::{log_event_with_fields, Event, Severity};

const REALM: &str = "Basic realm=\"snapview\"";

/// Credentials checked by `require_auth`
#[derive(Debug, Clone)]
pub struct AuthState {
    config: AuthConfig,
}

impl AuthState {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.mode == AuthMode::Basic
    }

    /// Check an `Authorization` header set against the configured user
    pub fn verify(&self, headers: &HeaderMap) -> bool {
        match self.config.mode {
            AuthMode::None => true,
            AuthMode::Basic => match extract_basic_credentials(headers) {
                Some((user, pass)) => {
                    let user_ok = user.as_bytes().ct_eq(self.config.username.as_bytes());
                    let pass_ok = pass.as_bytes().ct_eq(self.config.password.as_bytes());
                    bool::from(user_ok & pass_ok)
                }
                None => false,
            },
        }
    }
}

/// Decode `Authorization: Basic <base64(user:pass)>`
fn extract_basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let encoded = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Basic "))?;

    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (user, pass) = decoded.split_once(':')?;
    Some((user.to_string(), pass.to_string()))
}

/// Middleware rejecting requests without valid credentials
pub async fn require_auth(
    State(auth): State<Arc<AuthState>>,
    request: Request,
    next: Next,
) -> Response {
    if auth.verify(request.headers()) {
        return next.run(request).await;
    }

    log_event_with_fields(
        Event::AuthRejected,
        Severity::Warn,
        &[("path", request.uri().path())],
    );

    let mut response = (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Authentication required".to_string(),
            code: 401,
        }),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static(REALM));
    response
}
