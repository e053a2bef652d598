//! # Ledger Errors
//!
//! [`VoteError`] is the caller-facing taxonomy. [`StoreError`] is what a
//! storage backend reports; it reaches callers unmodified inside
//! [`VoteError::StorageFailure`].

use thiserror::Error;
use unimarket_core::ValidationError;

/// A storage backend rejected a read or write.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Driver, connection, or query failure.
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A record the transaction expected to exist is gone.
    #[error("record missing: {0}")]
    MissingRecord(String),

    /// A uniqueness constraint was violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The write would break a stored invariant (negative counter,
    /// counter outside the post table, inconsistent vote state).
    #[error("integrity violation: {0}")]
    Integrity(String),
}

/// Errors returned by [`crate::VoteLedger`] operations.
#[derive(Error, Debug)]
pub enum VoteError {
    /// No caller identity was supplied.
    #[error("authentication required")]
    Unauthenticated,

    /// The referenced post or comment does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller is not allowed to change this record.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Malformed identifier, polarity, or title.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The persistence layer failed. The transaction was rolled back.
    #[error("storage failure: {0}")]
    StorageFailure(#[from] StoreError),
}

impl From<ValidationError> for VoteError {
    fn from(err: ValidationError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
