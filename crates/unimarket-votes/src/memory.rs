//! # In-Memory Vote Store
//!
//! Process-local [`VoteStore`] for development and tests. A single async
//! mutex guards all state; a [`VoteTxn`] holds it for its whole lifetime,
//! so transactions are fully serialized. Writes are applied in place and
//! journaled, and the journal is replayed backwards if the transaction is
//! dropped without committing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use unimarket_core::{CommentId, CounterDelta, CounterField, Polarity, PostId, VoteId, VoterId};

use crate::error::StoreError;
use crate::model::{Comment, Post, Vote, VoteTally};
use crate::store::{VoteStore, VoteTxn};

#[derive(Debug, Default)]
struct MemoryState {
    posts: HashMap<PostId, Post>,
    votes: HashMap<VoteId, Vote>,
    by_voter: HashMap<(PostId, VoterId), VoteId>,
    comments: HashMap<CommentId, Comment>,
}

impl MemoryState {
    fn vote_for(&self, post: &PostId, voter: &VoterId) -> Option<Vote> {
        self.by_voter
            .get(&(*post, *voter))
            .and_then(|id| self.votes.get(id))
            .cloned()
    }

    fn put_vote(&mut self, vote: Vote) {
        self.by_voter.insert((vote.post_id, vote.voter_id), vote.id);
        self.votes.insert(vote.id, vote);
    }

    fn take_vote(&mut self, id: &VoteId) -> Option<Vote> {
        let vote = self.votes.remove(id)?;
        self.by_voter.remove(&(vote.post_id, vote.voter_id));
        Some(vote)
    }
}

/// Thread-safe, cloneable in-memory store. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryVoteStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryVoteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn vote_count(&self) -> usize {
        self.state.lock().await.votes.len()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn begin(&self) -> Result<Box<dyn VoteTxn>, StoreError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        Ok(Box::new(MemoryTxn {
            state: guard,
            journal: Vec::new(),
            committed: false,
        }))
    }

    async fn insert_post(&self, post: &Post) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.posts.contains_key(&post.id) {
            return Err(StoreError::Conflict(format!("post {} already exists", post.id)));
        }
        state.posts.insert(post.id, post.clone());
        Ok(())
    }

    async fn get_post(&self, id: &PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.state.lock().await.posts.get(id).cloned())
    }

    async fn find_vote(&self, post: &PostId, voter: &VoterId) -> Result<Option<Vote>, StoreError> {
        Ok(self.state.lock().await.vote_for(post, voter))
    }

    async fn find_comment(&self, id: &CommentId) -> Result<Option<Comment>, StoreError> {
        Ok(self.state.lock().await.comments.get(id).cloned())
    }

    async fn list_comments(&self, post: &PostId) -> Result<Vec<Comment>, StoreError> {
        let state = self.state.lock().await;
        let mut comments: Vec<Comment> = state
            .comments
            .values()
            .filter(|c| c.post_id == *post)
            .cloned()
            .collect();
        comments.sort_by_key(|c| (c.created_at, c.id));
        Ok(comments)
    }
}

/// Inverse of one applied write.
#[derive(Debug)]
enum Undo {
    Inserted(VoteId),
    Updated(Vote),
    Deleted(Vote),
    Adjusted {
        post: PostId,
        field: CounterField,
        delta: CounterDelta,
    },
    CommentInserted(CommentId),
    CommentDeleted(Comment),
    PostDeleted {
        post: Post,
        votes: Vec<Vote>,
        comments: Vec<Comment>,
    },
}

struct MemoryTxn {
    state: OwnedMutexGuard<MemoryState>,
    journal: Vec<Undo>,
    committed: bool,
}

impl MemoryTxn {
    fn rollback(&mut self) {
        while let Some(undo) = self.journal.pop() {
            match undo {
                Undo::Inserted(id) => {
                    self.state.take_vote(&id);
                }
                Undo::Updated(previous) | Undo::Deleted(previous) => {
                    self.state.put_vote(previous);
                }
                Undo::Adjusted { post, field, delta } => {
                    if let Some(record) = self.state.posts.get_mut(&post) {
                        if let Err(e) = record.adjust(field, delta.inverse()) {
                            tracing::error!(
                                post_id = %post,
                                counter = %field,
                                error = %e,
                                "failed to reverse counter adjustment"
                            );
                        }
                    }
                }
                Undo::CommentInserted(id) => {
                    self.state.comments.remove(&id);
                }
                Undo::CommentDeleted(comment) => {
                    self.state.comments.insert(comment.id, comment);
                }
                Undo::PostDeleted {
                    post,
                    votes,
                    comments,
                } => {
                    self.state.posts.insert(post.id, post);
                    for vote in votes {
                        self.state.put_vote(vote);
                    }
                    for comment in comments {
                        self.state.comments.insert(comment.id, comment);
                    }
                }
            }
        }
    }
}

impl Drop for MemoryTxn {
    fn drop(&mut self) {
        if !self.committed && !self.journal.is_empty() {
            tracing::debug!(writes = self.journal.len(), "rolling back in-memory vote transaction");
            self.rollback();
        }
    }
}

#[async_trait]
impl VoteTxn for MemoryTxn {
    async fn lock_post(&mut self, id: &PostId) -> Result<Option<Post>, StoreError> {
        Ok(self.state.posts.get(id).cloned())
    }

    async fn find_vote(
        &mut self,
        post: &PostId,
        voter: &VoterId,
    ) -> Result<Option<Vote>, StoreError> {
        Ok(self.state.vote_for(post, voter))
    }

    async fn insert_vote(&mut self, vote: &Vote) -> Result<(), StoreError> {
        if !self.state.posts.contains_key(&vote.post_id) {
            return Err(StoreError::Integrity(format!(
                "vote references unknown post {}",
                vote.post_id
            )));
        }
        if self
            .state
            .by_voter
            .contains_key(&(vote.post_id, vote.voter_id))
        {
            return Err(StoreError::Conflict(format!(
                "voter {} already has a vote on post {}",
                vote.voter_id, vote.post_id
            )));
        }
        self.state.put_vote(vote.clone());
        self.journal.push(Undo::Inserted(vote.id));
        Ok(())
    }

    async fn update_vote(&mut self, id: &VoteId, polarity: Polarity) -> Result<Vote, StoreError> {
        let record = self
            .state
            .votes
            .get_mut(id)
            .ok_or_else(|| StoreError::MissingRecord(format!("vote {id}")))?;
        let previous = record.clone();
        record.polarity = polarity;
        record.updated_at = Utc::now();
        let updated = record.clone();
        self.journal.push(Undo::Updated(previous));
        Ok(updated)
    }

    async fn delete_vote(&mut self, id: &VoteId) -> Result<(), StoreError> {
        let removed = self
            .state
            .take_vote(id)
            .ok_or_else(|| StoreError::MissingRecord(format!("vote {id}")))?;
        self.journal.push(Undo::Deleted(removed));
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &Comment) -> Result<(), StoreError> {
        if !self.state.posts.contains_key(&comment.post_id) {
            return Err(StoreError::Integrity(format!(
                "comment references unknown post {}",
                comment.post_id
            )));
        }
        if self.state.comments.contains_key(&comment.id) {
            return Err(StoreError::Conflict(format!(
                "comment {} already exists",
                comment.id
            )));
        }
        self.state.comments.insert(comment.id, comment.clone());
        self.journal.push(Undo::CommentInserted(comment.id));
        Ok(())
    }

    async fn delete_comment(&mut self, id: &CommentId) -> Result<bool, StoreError> {
        match self.state.comments.remove(id) {
            Some(removed) => {
                self.journal.push(Undo::CommentDeleted(removed));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_post(&mut self, id: &PostId) -> Result<(), StoreError> {
        let post = self
            .state
            .posts
            .remove(id)
            .ok_or_else(|| StoreError::MissingRecord(format!("post {id}")))?;

        let vote_ids: Vec<VoteId> = self
            .state
            .votes
            .values()
            .filter(|v| v.post_id == *id)
            .map(|v| v.id)
            .collect();
        let votes: Vec<Vote> = vote_ids
            .iter()
            .filter_map(|vote_id| self.state.take_vote(vote_id))
            .collect();

        let comment_ids: Vec<CommentId> = self
            .state
            .comments
            .values()
            .filter(|c| c.post_id == *id)
            .map(|c| c.id)
            .collect();
        let comments: Vec<Comment> = comment_ids
            .iter()
            .filter_map(|comment_id| self.state.comments.remove(comment_id))
            .collect();

        self.journal.push(Undo::PostDeleted {
            post,
            votes,
            comments,
        });
        Ok(())
    }

    async fn adjust_counter(
        &mut self,
        post: &PostId,
        field: CounterField,
        delta: CounterDelta,
    ) -> Result<u64, StoreError> {
        let record = self
            .state
            .posts
            .get_mut(post)
            .ok_or_else(|| StoreError::MissingRecord(format!("post {post}")))?;
        let value = record.adjust(field, delta)?;
        self.journal.push(Undo::Adjusted {
            post: *post,
            field,
            delta,
        });
        Ok(value)
    }

    async fn count_votes(&mut self, post: &PostId) -> Result<VoteTally, StoreError> {
        let mut tally = VoteTally::default();
        for vote in self.state.votes.values().filter(|v| v.post_id == *post) {
            tally.record(vote.polarity);
        }
        Ok(tally)
    }

    async fn commit(&mut self) -> Result<(), StoreError> {
        self.committed = true;
        self.journal.clear();
        Ok(())
    }
}
