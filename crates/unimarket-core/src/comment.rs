//! Validated comment body.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum comment length, in characters.
pub const MAX_COMMENT_CHARS: usize = 1000;

/// A trimmed, non-empty comment of at most [`MAX_COMMENT_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommentBody(String);

impl CommentBody {
    /// Validate and trim a comment body.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let trimmed = s.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidComment(
                "content must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_COMMENT_CHARS {
            return Err(ValidationError::InvalidComment(format!(
                "content must not exceed {MAX_COMMENT_CHARS} characters"
            )));
        }
        Ok(Self(trimmed))
    }

    /// Return the body as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for CommentBody {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CommentBody> for String {
    fn from(body: CommentBody) -> Self {
        body.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_keeps_inner_newlines() {
        let body = CommentBody::new("\n still available?\nDM me ").unwrap();
        assert_eq!(body.as_str(), "still available?\nDM me");
    }

    #[test]
    fn rejects_blank() {
        let err = CommentBody::new(" \t ").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidComment(_)));
    }

    #[test]
    fn limit_is_inclusive() {
        assert!(CommentBody::new("a".repeat(MAX_COMMENT_CHARS)).is_ok());
        assert!(CommentBody::new("a".repeat(MAX_COMMENT_CHARS + 1)).is_err());
    }
}
