//! # Authentication Middleware
//!
//! Resolves the caller's voter identity from the bearer token and injects a
//! [`CallerIdentity`] into request extensions.
//!
//! ## Token Format
//!
//! ```text
//! Bearer {voter_id}:{secret}   when AUTH_TOKEN is configured
//! Bearer {voter_id}            development mode (no AUTH_TOKEN)
//! ```
//!
//! A request without an `Authorization` header passes through as anonymous.
//! Handlers that need a voter extract [`CallerIdentity`] (401 when absent);
//! read paths extract `Option<CallerIdentity>`. A header that is present but
//! malformed is rejected here with 401, except on `GET` and `HEAD`, where
//! the request continues as anonymous.

use axum::extract::Request;
use axum::http::request::Parts;
use axum::http::{header, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use subtle::ConstantTimeEq;
use unimarket_core::VoterId;

use crate::error::{AppError, ErrorBody, ErrorDetail};

// ── SecretToken ─────────────────────────────────────────────────────────────

/// Shared bearer secret. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretToken(String);

impl SecretToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret, for comparison only.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretToken([REDACTED])")
    }
}

// ── CallerIdentity ──────────────────────────────────────────────────────────

/// The authenticated voter behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub voter_id: VoterId,
}

/// Extracts the identity that the auth middleware injected into extensions.
///
/// Returns 401 for anonymous requests. Wrap in `Option` to accept them.
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("authentication required".into()))
    }
}

// ── Auth Configuration ──────────────────────────────────────────────────────

/// Auth configuration injected into request extensions.
#[derive(Debug, Clone, Default)]
pub struct AuthConfig {
    pub token: Option<SecretToken>,
}

// ── Token Validation ────────────────────────────────────────────────────────

fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse a bearer token into a [`CallerIdentity`].
///
/// With an expected secret the token must be `{voter_id}:{secret}`. Without
/// one, any suffix after the first `:` is ignored.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
) -> Result<CallerIdentity, String> {
    let voter_part = match expected_secret {
        Some(expected) => {
            let (voter, secret) = provided
                .split_once(':')
                .ok_or_else(|| "invalid token format: expected {voter_id}:{secret}".to_string())?;
            if !constant_time_token_eq(secret, expected) {
                return Err("invalid bearer token".into());
            }
            voter
        }
        None => provided.split_once(':').map_or(provided, |(voter, _)| voter),
    };

    let voter_id = voter_part
        .parse::<VoterId>()
        .map_err(|e| format!("invalid bearer token: {e}"))?;
    Ok(CallerIdentity { voter_id })
}

// ── Middleware ───────────────────────────────────────────────────────────────

/// Resolve the `Authorization` header into a [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let config = request
        .extensions()
        .get::<AuthConfig>()
        .cloned()
        .unwrap_or_default();

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .map(|v| v.to_str().unwrap_or_default().to_owned());

    let Some(header_value) = auth_header else {
        return next.run(request).await;
    };

    let resolved = match header_value.strip_prefix("Bearer ") {
        Some(provided) => {
            let expected = config.token.as_ref().map(SecretToken::expose);
            parse_bearer_token(provided, expected)
        }
        None => Err("authorization header must use Bearer scheme".to_string()),
    };

    match resolved {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(msg) if is_read_only(request.method()) => {
            tracing::warn!(
                reason = %msg,
                method = %request.method(),
                "invalid authorization on read request, continuing as anonymous"
            );
            next.run(request).await
        }
        Err(msg) => {
            tracing::warn!(reason = %msg, "authentication failed");
            unauthorized_response(&msg)
        }
    }
}

fn is_read_only(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD)
}

fn unauthorized_response(message: &str) -> Response {
    let body = ErrorBody {
        error: ErrorDetail {
            code: "UNAUTHORIZED".to_string(),
            message: message.to_string(),
            details: None,
        },
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}
