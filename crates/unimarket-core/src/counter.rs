//! # Counter Allow-List
//!
//! Denormalized counters are adjusted by storage backends with statements
//! of the form `SET col = col + 1`. The column name can only come from
//! [`CounterField::column`], so a counter target is never built from
//! unvalidated input.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A counter column that may be adjusted by one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CounterField {
    /// Post upvote tally.
    Upvotes,
    /// Post downvote tally.
    Downvotes,
    /// Post comment tally.
    CommentCount,
    /// Community member tally. Not a post column.
    MemberCount,
}

impl CounterField {
    /// Every allowed counter.
    pub const ALL: [CounterField; 4] = [
        CounterField::Upvotes,
        CounterField::Downvotes,
        CounterField::CommentCount,
        CounterField::MemberCount,
    ];

    /// The storage column name.
    pub fn column(&self) -> &'static str {
        match self {
            Self::Upvotes => "upvotes",
            Self::Downvotes => "downvotes",
            Self::CommentCount => "comment_count",
            Self::MemberCount => "member_count",
        }
    }

    /// Whether this counter lives on the post record.
    pub fn is_post_counter(&self) -> bool {
        !matches!(self, Self::MemberCount)
    }
}

impl std::fmt::Display for CounterField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for CounterField {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.column() == s)
            .ok_or_else(|| ValidationError::UnknownCounterField(s.to_string()))
    }
}

/// A unit adjustment to a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CounterDelta {
    /// Add one.
    Increment,
    /// Subtract one.
    Decrement,
}

impl CounterDelta {
    /// Signed value for SQL binds.
    pub fn as_i64(&self) -> i64 {
        match self {
            Self::Increment => 1,
            Self::Decrement => -1,
        }
    }

    /// Apply to a non-negative counter. Returns `None` on underflow or overflow.
    pub fn apply(&self, value: u64) -> Option<u64> {
        match self {
            Self::Increment => value.checked_add(1),
            Self::Decrement => value.checked_sub(1),
        }
    }

    /// The adjustment that undoes this one.
    pub fn inverse(&self) -> Self {
        match self {
            Self::Increment => Self::Decrement,
            Self::Decrement => Self::Increment,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn allow_list_parses_every_column() {
        for field in CounterField::ALL {
            assert_eq!(field.column().parse::<CounterField>().unwrap(), field);
        }
    }

    #[test]
    fn rejects_columns_off_the_allow_list() {
        for bad in ["id", "title", "upvotes; DROP TABLE posts", "Upvotes", ""] {
            assert_eq!(
                bad.parse::<CounterField>().unwrap_err(),
                ValidationError::UnknownCounterField(bad.to_string())
            );
        }
    }

    #[test]
    fn member_count_is_not_a_post_counter() {
        assert!(!CounterField::MemberCount.is_post_counter());
        assert!(CounterField::CommentCount.is_post_counter());
    }

    #[test]
    fn decrement_at_zero_underflows() {
        assert_eq!(CounterDelta::Decrement.apply(0), None);
        assert_eq!(CounterDelta::Decrement.apply(3), Some(2));
    }

    proptest! {
        #[test]
        fn inverse_undoes_apply(value in 1u64..u64::MAX) {
            for delta in [CounterDelta::Increment, CounterDelta::Decrement] {
                let moved = delta.apply(value).unwrap();
                prop_assert_eq!(delta.inverse().apply(moved), Some(value));
            }
        }
    }
}
