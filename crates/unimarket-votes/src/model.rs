//! # Ledger Records
//!
//! [`Post`] carries the denormalized counters; [`Vote`] is one voter's
//! current stance on one post. [`Comment`] records are what
//! `comment_count` counts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unimarket_core::{
    CommentBody, CommentId, CounterDelta, CounterField, Polarity, PostId, PostTitle, VoteId,
    VoterId,
};

use crate::error::StoreError;

/// A community post and its cached tallies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: VoterId,
    pub title: PostTitle,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
}

impl Post {
    /// A fresh post with every counter at zero.
    pub fn new(author_id: VoterId, title: PostTitle) -> Self {
        Self {
            id: PostId::new(),
            author_id,
            title,
            upvotes: 0,
            downvotes: 0,
            comment_count: 0,
            created_at: Utc::now(),
        }
    }

    /// Read a counter. `None` for counters that do not live on posts.
    pub fn counter(&self, field: CounterField) -> Option<u64> {
        match field {
            CounterField::Upvotes => Some(self.upvotes),
            CounterField::Downvotes => Some(self.downvotes),
            CounterField::CommentCount => Some(self.comment_count),
            CounterField::MemberCount => None,
        }
    }

    /// Mutable access to a counter. `None` for counters that do not live on posts.
    pub fn counter_mut(&mut self, field: CounterField) -> Option<&mut u64> {
        match field {
            CounterField::Upvotes => Some(&mut self.upvotes),
            CounterField::Downvotes => Some(&mut self.downvotes),
            CounterField::CommentCount => Some(&mut self.comment_count),
            CounterField::MemberCount => None,
        }
    }

    /// Apply a unit adjustment, returning the new value.
    ///
    /// Fails on a non-post counter or when a decrement would go below zero.
    pub fn adjust(&mut self, field: CounterField, delta: CounterDelta) -> Result<u64, StoreError> {
        let post_id = self.id;
        let slot = self.counter_mut(field).ok_or_else(|| {
            StoreError::Integrity(format!("counter {field} is not a post column"))
        })?;
        let next = delta.apply(*slot).ok_or_else(|| {
            StoreError::Integrity(format!(
                "counter {field} on post {post_id} would leave its range ({} {:+})",
                *slot,
                delta.as_i64()
            ))
        })?;
        *slot = next;
        Ok(next)
    }
}

/// One voter's current polarity on one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: VoteId,
    pub post_id: PostId,
    pub voter_id: VoterId,
    pub polarity: Polarity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Vote {
    /// A new vote record stamped with the current time.
    pub fn new(post_id: PostId, voter_id: VoterId, polarity: Polarity) -> Self {
        let now = Utc::now();
        Self {
            id: VoteId::new(),
            post_id,
            voter_id,
            polarity,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A comment on a post. Only its author may delete it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: VoterId,
    pub body: CommentBody,
    pub created_at: DateTime<Utc>,
}

impl Comment {
    /// A new comment stamped with the current time.
    pub fn new(post_id: PostId, author_id: VoterId, body: CommentBody) -> Self {
        Self {
            id: CommentId::new(),
            post_id,
            author_id,
            body,
            created_at: Utc::now(),
        }
    }
}

/// Counters as read from the post plus the caller's own polarity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteState {
    pub upvotes: u64,
    pub downvotes: u64,
    pub user_vote: Option<Polarity>,
}

/// Vote records for a post, counted by polarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl VoteTally {
    /// Count one more vote of the given polarity.
    pub fn record(&mut self, polarity: Polarity) {
        match polarity {
            Polarity::Upvote => self.upvotes += 1,
            Polarity::Downvote => self.downvotes += 1,
        }
    }
}

/// Stored counters next to the recount of vote records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterAudit {
    pub post_id: PostId,
    pub stored: VoteTally,
    pub counted: VoteTally,
}

impl CounterAudit {
    /// True when the cached counters match the vote records.
    pub fn is_consistent(&self) -> bool {
        self.stored == self.counted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post() -> Post {
        Post::new(VoterId::new(), PostTitle::new("Used calculus textbook").unwrap())
    }

    #[test]
    fn new_post_starts_at_zero() {
        let p = post();
        assert_eq!((p.upvotes, p.downvotes, p.comment_count), (0, 0, 0));
    }

    #[test]
    fn adjust_touches_only_the_named_counter() {
        let mut p = post();
        assert_eq!(p.adjust(CounterField::Upvotes, CounterDelta::Increment).unwrap(), 1);
        assert_eq!(p.upvotes, 1);
        assert_eq!(p.downvotes, 0);
        assert_eq!(p.comment_count, 0);
    }

    #[test]
    fn adjust_rejects_underflow() {
        let mut p = post();
        let err = p
            .adjust(CounterField::Downvotes, CounterDelta::Decrement)
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(_)));
        assert_eq!(p.downvotes, 0);
    }

    #[test]
    fn adjust_rejects_member_count() {
        let mut p = post();
        let err = p
            .adjust(CounterField::MemberCount, CounterDelta::Increment)
            .unwrap_err();
        assert!(matches!(err, StoreError::Integrity(msg) if msg.contains("member_count")));
    }

    #[test]
    fn audit_consistency() {
        let mut counted = VoteTally::default();
        counted.record(Polarity::Upvote);
        let audit = CounterAudit {
            post_id: PostId::new(),
            stored: VoteTally { upvotes: 1, downvotes: 0 },
            counted,
        };
        assert!(audit.is_consistent());
    }
}
