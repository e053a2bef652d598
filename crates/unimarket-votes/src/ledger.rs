//! # Vote Ledger
//!
//! The single writer of vote records and vote counters. Every operation
//! takes the caller's identity explicitly; nothing here reads ambient
//! session state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use unimarket_core::{
    CommentBody, CommentId, CounterDelta, CounterField, Polarity, PostId, PostTitle, VoterId,
};

use crate::error::{StoreError, VoteError};
use crate::model::{Comment, CounterAudit, Post, Vote, VoteState, VoteTally};
use crate::resolution::{resolve, Resolution};
use crate::store::VoteStore;

/// Result of a successful [`VoteLedger::cast_vote`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CastOutcome {
    /// What happened to the voter's vote record.
    pub resolution: Resolution,
    /// The vote after the cast. `None` when it was removed.
    pub vote: Option<Vote>,
    /// Post counters and the caller's polarity after the cast.
    pub state: VoteState,
}

/// Result of a comment being added or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentOutcome {
    /// The comment that was added or removed.
    pub comment: Comment,
    /// The post's `comment_count` after the change.
    pub comment_count: u64,
}

/// Resolves casts and keeps post counters in step with vote records.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn VoteStore>,
}

impl std::fmt::Debug for VoteLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VoteLedger").finish_non_exhaustive()
    }
}

fn post_not_found(id: &PostId) -> VoteError {
    VoteError::NotFound(format!("post {id} not found"))
}

fn comment_not_found(id: &CommentId) -> VoteError {
    VoteError::NotFound(format!("comment {id} not found"))
}

fn counter_moved(post_id: &PostId, field: CounterField, expected: u64, stored: u64) -> VoteError {
    StoreError::Integrity(format!(
        "counter {field} on post {post_id} moved concurrently ({expected} expected, {stored} stored)"
    ))
    .into()
}

/// Move `comment_count` by one and check it against the locked post.
async fn step_comment_count(
    txn: &mut dyn crate::store::VoteTxn,
    post: &mut Post,
    delta: CounterDelta,
) -> Result<u64, VoteError> {
    let field = CounterField::CommentCount;
    let stored = txn.adjust_counter(&post.id, field, delta).await?;
    let expected = post.adjust(field, delta)?;
    if stored != expected {
        return Err(counter_moved(&post.id, field, expected, stored));
    }
    Ok(stored)
}

impl VoteLedger {
    /// Create a ledger over the given store.
    pub fn new(store: Arc<dyn VoteStore>) -> Self {
        Self { store }
    }

    /// Register a new post with zeroed counters, owned by the caller.
    pub async fn create_post(
        &self,
        caller: Option<&VoterId>,
        title: &str,
    ) -> Result<Post, VoteError> {
        let author = caller.ok_or(VoteError::Unauthenticated)?;
        let post = Post::new(*author, PostTitle::new(title)?);
        self.store.insert_post(&post).await?;
        tracing::info!(post_id = %post.id, author = %author, "post registered");
        Ok(post)
    }

    /// Delete a post along with its votes and comments. Author only.
    pub async fn delete_post(
        &self,
        caller: Option<&VoterId>,
        post_id: &PostId,
    ) -> Result<(), VoteError> {
        let voter = caller.ok_or(VoteError::Unauthenticated)?;

        let mut txn = self.store.begin().await?;
        let post = txn
            .lock_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;
        if post.author_id != *voter {
            return Err(VoteError::Forbidden(format!(
                "no permission to delete post {post_id}"
            )));
        }
        txn.delete_post(post_id).await?;
        txn.commit().await?;

        tracing::info!(
            post_id = %post_id,
            author = %voter,
            upvotes = post.upvotes,
            downvotes = post.downvotes,
            comment_count = post.comment_count,
            "post deleted"
        );
        Ok(())
    }

    /// Fetch a post record.
    pub async fn get_post(&self, post_id: &PostId) -> Result<Post, VoteError> {
        self.store
            .get_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))
    }

    /// Cast `requested` on behalf of `caller`.
    ///
    /// Creates, flips, or removes the caller's vote according to
    /// [`resolve`] and applies the matching counter adjustments in the same
    /// transaction. On any error nothing is written.
    pub async fn cast_vote(
        &self,
        caller: Option<&VoterId>,
        post_id: &PostId,
        requested: Polarity,
    ) -> Result<CastOutcome, VoteError> {
        let voter = caller.ok_or(VoteError::Unauthenticated)?;

        let mut txn = self.store.begin().await?;
        let mut post = txn
            .lock_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;
        let existing = txn.find_vote(post_id, voter).await?;

        let resolution = resolve(existing.as_ref().map(|v| v.polarity), requested);
        tracing::debug!(
            post_id = %post_id,
            voter_id = %voter,
            requested = %requested,
            resolution = resolution.as_str(),
            "resolved vote"
        );

        let vote = match (resolution, existing) {
            (Resolution::Created, None) => {
                let vote = Vote::new(*post_id, *voter, requested);
                txn.insert_vote(&vote).await?;
                Some(vote)
            }
            (Resolution::Removed, Some(current)) => {
                txn.delete_vote(&current.id).await?;
                None
            }
            (Resolution::Switched { .. }, Some(current)) => {
                Some(txn.update_vote(&current.id, requested).await?)
            }
            (resolution, existing) => {
                return Err(StoreError::Integrity(format!(
                    "resolution {} does not fit existing vote {existing:?}",
                    resolution.as_str()
                ))
                .into());
            }
        };

        for (field, delta) in resolution.adjustments(requested) {
            let stored = txn.adjust_counter(post_id, field, delta).await?;
            let expected = post.adjust(field, delta)?;
            if stored != expected {
                return Err(counter_moved(post_id, field, expected, stored));
            }
        }

        txn.commit().await?;

        tracing::info!(
            post_id = %post_id,
            voter_id = %voter,
            resolution = resolution.as_str(),
            upvotes = post.upvotes,
            downvotes = post.downvotes,
            "vote cast"
        );

        Ok(CastOutcome {
            resolution,
            state: VoteState {
                upvotes: post.upvotes,
                downvotes: post.downvotes,
                user_vote: vote.as_ref().map(|v| v.polarity),
            },
            vote,
        })
    }

    /// Current counters plus the caller's own polarity.
    ///
    /// Counters come straight from the post. An anonymous caller gets
    /// `user_vote: None` rather than an error.
    pub async fn get_vote_state(
        &self,
        post_id: &PostId,
        caller: Option<&VoterId>,
    ) -> Result<VoteState, VoteError> {
        let post = self.get_post(post_id).await?;
        let user_vote = match caller {
            Some(voter) => self
                .store
                .find_vote(post_id, voter)
                .await?
                .map(|v| v.polarity),
            None => None,
        };
        Ok(VoteState {
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            user_vote,
        })
    }

    /// The caller's own polarity on a post, if any. A missing post yields `None`.
    pub async fn get_user_vote(
        &self,
        post_id: &PostId,
        caller: Option<&VoterId>,
    ) -> Result<Option<Polarity>, VoteError> {
        let voter = caller.ok_or(VoteError::Unauthenticated)?;
        Ok(self
            .store
            .find_vote(post_id, voter)
            .await?
            .map(|v| v.polarity))
    }

    /// Add a comment by `caller` and bump the post's `comment_count`.
    pub async fn add_comment(
        &self,
        caller: Option<&VoterId>,
        post_id: &PostId,
        body: &str,
    ) -> Result<CommentOutcome, VoteError> {
        let author = caller.ok_or(VoteError::Unauthenticated)?;
        let body = CommentBody::new(body)?;

        let mut txn = self.store.begin().await?;
        let mut post = txn
            .lock_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;

        let comment = Comment::new(*post_id, *author, body);
        txn.insert_comment(&comment).await?;
        let comment_count =
            step_comment_count(&mut *txn, &mut post, CounterDelta::Increment).await?;
        txn.commit().await?;

        tracing::info!(
            post_id = %post_id,
            comment_id = %comment.id,
            author = %author,
            comment_count,
            "comment added"
        );
        Ok(CommentOutcome {
            comment,
            comment_count,
        })
    }

    /// Delete a comment and decrement its post's `comment_count`. Author only.
    pub async fn delete_comment(
        &self,
        caller: Option<&VoterId>,
        comment_id: &CommentId,
    ) -> Result<CommentOutcome, VoteError> {
        let voter = caller.ok_or(VoteError::Unauthenticated)?;
        let comment = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| comment_not_found(comment_id))?;
        if comment.author_id != *voter {
            return Err(VoteError::Forbidden(format!(
                "no permission to delete comment {comment_id}"
            )));
        }

        let post_id = comment.post_id;
        let mut txn = self.store.begin().await?;
        let mut post = txn
            .lock_post(&post_id)
            .await?
            .ok_or_else(|| comment_not_found(comment_id))?;
        if !txn.delete_comment(comment_id).await? {
            return Err(comment_not_found(comment_id));
        }
        let comment_count =
            step_comment_count(&mut *txn, &mut post, CounterDelta::Decrement).await?;
        txn.commit().await?;

        tracing::info!(
            post_id = %post_id,
            comment_id = %comment_id,
            author = %voter,
            comment_count,
            "comment deleted"
        );
        Ok(CommentOutcome {
            comment,
            comment_count,
        })
    }

    /// Comments on a post, oldest first.
    pub async fn list_comments(&self, post_id: &PostId) -> Result<Vec<Comment>, VoteError> {
        self.get_post(post_id).await?;
        Ok(self.store.list_comments(post_id).await?)
    }

    /// Recount a post's vote records under its lock and compare with the
    /// stored counters. Read-only.
    pub async fn audit_counters(&self, post_id: &PostId) -> Result<CounterAudit, VoteError> {
        let mut txn = self.store.begin().await?;
        let post = txn
            .lock_post(post_id)
            .await?
            .ok_or_else(|| post_not_found(post_id))?;
        let counted = txn.count_votes(post_id).await?;
        txn.commit().await?;

        let audit = CounterAudit {
            post_id: *post_id,
            stored: VoteTally {
                upvotes: post.upvotes,
                downvotes: post.downvotes,
            },
            counted,
        };
        if !audit.is_consistent() {
            tracing::warn!(
                post_id = %post_id,
                stored = ?audit.stored,
                counted = ?audit.counted,
                "vote counter drift detected"
            );
        }
        Ok(audit)
    }
}
