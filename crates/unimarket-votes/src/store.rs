//! # Persistence Seam
//!
//! [`VoteStore`] exposes pure reads and opens [`VoteTxn`]s. All writes go
//! through a transaction so that the vote row and the counters move
//! together.
//!
//! ## Contract for implementors
//!
//! - [`VoteTxn::lock_post`] must serialize every transaction touching the
//!   same post until commit or drop (`SELECT ... FOR UPDATE`, a mutex).
//! - [`VoteTxn::adjust_counter`] must be an atomic relative update
//!   (`col = col + $1`), never a read-then-write of an absolute value.
//! - Dropping a transaction without a successful [`VoteTxn::commit`] must
//!   discard every write it made.
//! - [`VoteTxn::delete_post`] removes the post's votes and comments too.

use async_trait::async_trait;
use unimarket_core::{CommentId, CounterDelta, CounterField, Polarity, PostId, VoteId, VoterId};

use crate::error::StoreError;
use crate::model::{Comment, Post, Vote, VoteTally};

/// Read access and transaction factory for posts and votes.
#[async_trait]
pub trait VoteStore: Send + Sync + 'static {
    /// Open a write transaction.
    async fn begin(&self) -> Result<Box<dyn VoteTxn>, StoreError>;

    /// Persist a new post.
    async fn insert_post(&self, post: &Post) -> Result<(), StoreError>;

    /// Point lookup of a post.
    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, StoreError>;

    /// Point lookup of the vote for (post, voter).
    async fn find_vote(&self, post: &PostId, voter: &VoterId) -> Result<Option<Vote>, StoreError>;

    /// Point lookup of a comment.
    async fn find_comment(&self, id: &CommentId) -> Result<Option<Comment>, StoreError>;

    /// Comments on a post, oldest first.
    async fn list_comments(&self, post: &PostId) -> Result<Vec<Comment>, StoreError>;
}

/// A write transaction over posts and votes.
#[async_trait]
pub trait VoteTxn: Send {
    /// Fetch a post and hold its lock until the transaction ends.
    async fn lock_post(&mut self, id: &PostId) -> Result<Option<Post>, StoreError>;

    /// Point lookup of the vote for (post, voter), seeing this transaction's writes.
    async fn find_vote(
        &mut self,
        post: &PostId,
        voter: &VoterId,
    ) -> Result<Option<Vote>, StoreError>;

    /// Insert a vote. Fails with [`StoreError::Conflict`] if (post, voter) already has one.
    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), StoreError>;

    /// Change a vote's polarity and return the updated record.
    async fn update_vote(&mut self, id: &VoteId, polarity: Polarity) -> Result<Vote, StoreError>;

    /// Delete a vote.
    async fn delete_vote(&mut self, id: &VoteId) -> Result<(), StoreError>;

    /// Insert a comment on an existing post.
    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StoreError>;

    /// Delete a comment. Returns `false` if it was already gone.
    async fn delete_comment(&mut self, id: &CommentId) -> Result<bool, StoreError>;

    /// Delete a post together with its votes and comments.
    async fn delete_post(&mut self, id: &PostId) -> Result<(), StoreError>;

    /// Adjust an allow-listed counter by one and return its new value.
    async fn adjust_counter(
        &mut self,
        post: &PostId,
        field: CounterField,
        delta: CounterDelta,
    ) -> Result<u64, StoreError>;

    /// Count the vote records of a post by polarity.
    async fn count_votes(&mut self, post: &PostId) -> Result<VoteTally, StoreError>;

    /// Make every write of this transaction visible.
    async fn commit(&mut self) -> Result<(), StoreError>;
}
