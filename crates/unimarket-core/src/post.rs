//! Validated post title.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Maximum title length, in characters.
pub const MAX_TITLE_CHARS: usize = 300;

/// A trimmed, non-empty post title of at most [`MAX_TITLE_CHARS`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PostTitle(String);

impl PostTitle {
    /// Validate and trim a title.
    pub fn new(s: impl Into<String>) -> Result<Self, ValidationError> {
        let trimmed = s.into().trim().to_string();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidTitle(
                "title must not be empty".to_string(),
            ));
        }
        if trimmed.chars().count() > MAX_TITLE_CHARS {
            return Err(ValidationError::InvalidTitle(format!(
                "title must not exceed {MAX_TITLE_CHARS} characters"
            )));
        }
        Ok(Self(trimmed))
    }

    /// Return the title as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PostTitle {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PostTitle> for String {
    fn from(title: PostTitle) -> Self {
        title.0
    }
}

impl std::fmt::Display for PostTitle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
