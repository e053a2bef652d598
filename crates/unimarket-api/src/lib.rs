//! # unimarket-api: HTTP Surface for Community Votes
//!
//! Serves the vote ledger over JSON/HTTP.
//!
//! ## API Surface
//!
//! | Route                          | Module              | Auth     |
//! |--------------------------------|---------------------|----------|
//! | `POST /v1/posts`               | [`routes::posts`]   | required |
//! | `GET /v1/posts/:id`            | [`routes::posts`]   | none     |
//! | `DELETE /v1/posts/:id`         | [`routes::posts`]   | author   |
//! | `POST /v1/posts/:id/votes`     | [`routes::votes`]   | required |
//! | `GET /v1/posts/:id/votes`      | [`routes::votes`]   | optional |
//! | `GET /v1/posts/:id/votes/me`   | [`routes::votes`]   | required |
//! | `GET /v1/posts/:id/votes/audit`| [`routes::votes`]   | required |
//! | `POST /v1/posts/:id/comments`  | [`routes::comments`]| required |
//! | `GET /v1/posts/:id/comments`   | [`routes::comments`]| none     |
//! | `DELETE /v1/comments/:id`      | [`routes::comments`]| author   |
//!
//! On `GET`, a bearer token that fails verification is treated as
//! anonymous. Other methods answer it with 401.
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → AuthMiddleware → Handler
//! ```
//!
//! ## OpenAPI
//!
//! Generated via utoipa derive macros at `/openapi.json`.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::State;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::auth::AuthConfig;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health checks (`/health/*`) are mounted outside the auth middleware
/// so they remain accessible without credentials.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };

    let api = Router::new()
        .merge(routes::posts::router())
        .merge(routes::votes::router())
        .merge(routes::comments::router())
        .merge(openapi::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(axum::Extension(auth_config))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness))
        .with_state(state);

    Router::new().merge(health).merge(api)
}

/// Liveness check: 200 while the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness check: 503 when the database is configured but unreachable.
async fn readiness(State(state): State<AppState>) -> (StatusCode, &'static str) {
    match &state.db_pool {
        Some(pool) => match db::ping(pool).await {
            Ok(()) => (StatusCode::OK, "ready"),
            Err(e) => {
                tracing::warn!(error = %e, "readiness check failed: database unreachable");
                (StatusCode::SERVICE_UNAVAILABLE, "database unavailable")
            }
        },
        None => (StatusCode::OK, "ready"),
    }
}
