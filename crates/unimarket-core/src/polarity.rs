//! # Vote Polarity
//!
//! The two-valued stance a voter holds on a post. Serialized as the
//! lowercase strings `"upvote"` and `"downvote"` used by the API contract.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::counter::CounterField;
use crate::error::ValidationError;

/// A voter's stance on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    /// Counts toward `upvotes`.
    Upvote,
    /// Counts toward `downvotes`.
    Downvote,
}

impl Polarity {
    /// Both polarities, in declaration order.
    pub const ALL: [Polarity; 2] = [Polarity::Upvote, Polarity::Downvote];

    /// Return the wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upvote => "upvote",
            Self::Downvote => "downvote",
        }
    }

    /// The other polarity.
    pub fn opposite(&self) -> Self {
        match self {
            Self::Upvote => Self::Downvote,
            Self::Downvote => Self::Upvote,
        }
    }

    /// The post counter that tallies this polarity.
    pub fn counter_field(&self) -> CounterField {
        match self {
            Self::Upvote => CounterField::Upvotes,
            Self::Downvote => CounterField::Downvotes,
        }
    }
}

impl std::fmt::Display for Polarity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Polarity {
    type Err = ValidationError;

    /// Exact match only: `"Upvote"` or `" upvote"` are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upvote" => Ok(Self::Upvote),
            "downvote" => Ok(Self::Downvote),
            other => Err(ValidationError::InvalidPolarity(other.to_string())),
        }
    }
}
