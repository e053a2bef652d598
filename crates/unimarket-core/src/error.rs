//! # Validation Errors
//!
//! Raised when untrusted input (path segments, request bodies, column
//! names) fails to parse into one of the domain types of this crate.

use thiserror::Error;

/// Input failed domain validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Identifier is not a valid UUID.
    #[error("invalid {kind} identifier: \"{value}\"")]
    InvalidIdentifier {
        /// Which identifier was being parsed ("post", "voter", "vote", "comment").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// Polarity is neither `upvote` nor `downvote`.
    #[error("invalid vote type: \"{0}\" (expected \"upvote\" or \"downvote\")")]
    InvalidPolarity(String),

    /// Counter name is not on the allow-list.
    #[error("counter field not allowed: \"{0}\"")]
    UnknownCounterField(String),

    /// Post title is empty or too long.
    #[error("invalid post title: {0}")]
    InvalidTitle(String),

    /// Comment body is empty or too long.
    #[error("invalid comment: {0}")]
    InvalidComment(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_identifier_display_names_kind_and_value() {
        let err = ValidationError::InvalidIdentifier {
            kind: "post",
            value: "nope".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("post"));
        assert!(msg.contains("nope"));
    }

    #[test]
    fn invalid_polarity_display() {
        let err = ValidationError::InvalidPolarity("sideways".to_string());
        assert!(err.to_string().contains("sideways"));
    }
}
