//! # Application State & Configuration
//!
//! [`AppState`] is shared across handlers via Axum's `State` extractor. It
//! owns the [`VoteLedger`], backed by Postgres when a pool is available and
//! by the in-memory store otherwise.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;
use unimarket_votes::{MemoryVoteStore, VoteLedger, VoteStore};

use crate::auth::SecretToken;
use crate::db::votes::PgVoteStore;

/// Configuration could not be read from the environment.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("PORT must be a number between 0 and 65535, got \"{0}\"")]
    InvalidPort(String),
}

/// Application configuration.
///
/// Custom `Debug` redacts the auth token and the database URL.
#[derive(Clone)]
pub struct AppConfig {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Shared bearer secret. If `None`, tokens carry only the voter id.
    pub auth_token: Option<SecretToken>,
    /// Postgres connection string. If `None`, votes live in memory.
    pub database_url: Option<String>,
}

impl AppConfig {
    /// Read `PORT`, `AUTH_TOKEN` and `DATABASE_URL` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let port = match lookup("PORT") {
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(raw.clone()))?,
            None => defaults.port,
        };
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            port,
            auth_token: non_empty("AUTH_TOKEN").map(SecretToken::new),
            database_url: non_empty("DATABASE_URL"),
        })
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field(
                "database_url",
                &self.database_url.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            database_url: None,
        }
    }
}

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub ledger: VoteLedger,
    /// Present when running against Postgres; used by the readiness check.
    pub db_pool: Option<PgPool>,
}

impl AppState {
    /// Default configuration over a fresh in-memory store.
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// Build state for `config`, persisting to `db_pool` when given.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let store: Arc<dyn VoteStore> = match &db_pool {
            Some(pool) => Arc::new(PgVoteStore::new(pool.clone())),
            None => Arc::new(MemoryVoteStore::new()),
        };
        Self {
            config,
            ledger: VoteLedger::new(store),
            db_pool,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
