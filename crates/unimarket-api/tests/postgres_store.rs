//! Integration tests for the PostgreSQL vote store.
//!
//! These tests require a real PostgreSQL database and use SQLx test macros,
//! so every test gets a fresh database with the migrations applied.
//!
//! Run with:
//! `DATABASE_URL=postgres://... cargo test -p unimarket-api --features postgres-tests --test postgres_store`

use std::sync::Arc;

use unimarket_api::db::votes::PgVoteStore;
use unimarket_core::{CounterDelta, CounterField, Polarity, PostId, VoterId};
use unimarket_votes::{
    Resolution, StoreError, Vote, VoteError, VoteLedger, VoteState, VoteStore, VoteTally,
};
use uuid::Uuid;

fn ledger(pool: &sqlx::PgPool) -> (VoteLedger, Arc<PgVoteStore>) {
    let store = Arc::new(PgVoteStore::new(pool.clone()));
    (VoteLedger::new(store.clone()), store)
}

async fn new_post(ledger: &VoteLedger, author: &VoterId) -> PostId {
    ledger
        .create_post(Some(author), "Used bike, good brakes")
        .await
        .unwrap()
        .id
}

async fn counters(ledger: &VoteLedger, post: &PostId) -> (u64, u64) {
    let p = ledger.get_post(post).await.unwrap();
    (p.upvotes, p.downvotes)
}

async fn row_count(pool: &sqlx::PgPool, table: &str, post: &PostId) -> i64 {
    let sql = format!("SELECT COUNT(*) FROM {table} WHERE post_id = $1");
    sqlx::query_scalar(&sql)
        .bind(*post.as_uuid())
        .fetch_one(pool)
        .await
        .unwrap()
}

// ============================================================================
// Casting
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_create_toggle_and_switch(pool: sqlx::PgPool) {
    let (ledger, store) = ledger(&pool);
    let voter = VoterId::new();
    let post = new_post(&ledger, &voter).await;

    let created = ledger.cast_vote(Some(&voter), &post, Polarity::Upvote).await.unwrap();
    assert_eq!(created.resolution, Resolution::Created);
    assert_eq!(counters(&ledger, &post).await, (1, 0));
    let stored = store.find_vote(&post, &voter).await.unwrap().unwrap();
    assert_eq!(stored.polarity, Polarity::Upvote);

    let removed = ledger.cast_vote(Some(&voter), &post, Polarity::Upvote).await.unwrap();
    assert_eq!(removed.resolution, Resolution::Removed);
    assert!(store.find_vote(&post, &voter).await.unwrap().is_none());
    assert_eq!(counters(&ledger, &post).await, (0, 0));

    let first = ledger.cast_vote(Some(&voter), &post, Polarity::Upvote).await.unwrap();
    let switched = ledger.cast_vote(Some(&voter), &post, Polarity::Downvote).await.unwrap();
    assert_eq!(switched.resolution, Resolution::Switched { from: Polarity::Upvote });
    assert_eq!(first.vote.unwrap().id, switched.vote.unwrap().id);
    assert_eq!(counters(&ledger, &post).await, (0, 1));
    assert_eq!(
        row_count(&pool, "post_votes", &post).await,
        1,
        "a switch updates the row in place"
    );
}

#[sqlx::test(migrations = "./migrations")]
async fn test_two_voters_walkthrough(pool: sqlx::PgPool) {
    let (ledger, _) = ledger(&pool);
    let (a, b) = (VoterId::new(), VoterId::new());
    let post = new_post(&ledger, &a).await;

    let s = ledger.cast_vote(Some(&a), &post, Polarity::Upvote).await.unwrap();
    assert_eq!((s.state.upvotes, s.state.downvotes), (1, 0));
    let s = ledger.cast_vote(Some(&b), &post, Polarity::Downvote).await.unwrap();
    assert_eq!((s.state.upvotes, s.state.downvotes), (1, 1));
    let s = ledger.cast_vote(Some(&a), &post, Polarity::Downvote).await.unwrap();
    assert_eq!((s.state.upvotes, s.state.downvotes), (0, 2));
    let s = ledger.cast_vote(Some(&a), &post, Polarity::Downvote).await.unwrap();
    assert_eq!((s.state.upvotes, s.state.downvotes), (0, 1));
    assert_eq!(s.state.user_vote, None);

    let state = ledger.get_vote_state(&post, Some(&b)).await.unwrap();
    assert_eq!(
        state,
        VoteState { upvotes: 0, downvotes: 1, user_vote: Some(Polarity::Downvote) }
    );
    assert!(ledger.audit_counters(&post).await.unwrap().is_consistent());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_underflow_rolls_back_vote_change(pool: sqlx::PgPool) {
    let (ledger, store) = ledger(&pool);
    let voter = VoterId::new();
    let post = new_post(&ledger, &voter).await;

    // A downvote row with no matching counter: toggling it off would take
    // downvotes to -1 and trip the CHECK constraint.
    let vote_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO post_votes (id, post_id, voter_id, vote_type, created_at, updated_at) \
         VALUES ($1, $2, $3, 'downvote', NOW(), NOW())",
    )
    .bind(vote_id)
    .bind(*post.as_uuid())
    .bind(*voter.as_uuid())
    .execute(&pool)
    .await
    .unwrap();

    let err = ledger
        .cast_vote(Some(&voter), &post, Polarity::Downvote)
        .await
        .unwrap_err();
    assert!(
        matches!(err, VoteError::StorageFailure(StoreError::Integrity(_))),
        "got {err:?}"
    );

    let still_there = store.find_vote(&post, &voter).await.unwrap().unwrap();
    assert_eq!(still_there.id.as_uuid(), &vote_id);
    assert_eq!(still_there.polarity, Polarity::Downvote);
    assert_eq!(counters(&ledger, &post).await, (0, 0));

    let audit = ledger.audit_counters(&post).await.unwrap();
    assert!(!audit.is_consistent());
    assert_eq!(audit.counted, VoteTally { upvotes: 0, downvotes: 1 });
}

#[sqlx::test(migrations = "./migrations")]
async fn test_audit_is_consistent_after_mixed_casts(pool: sqlx::PgPool) {
    let (ledger, _) = ledger(&pool);
    let voters: Vec<VoterId> = (0..5).map(|_| VoterId::new()).collect();
    let post = new_post(&ledger, &voters[0]).await;

    for (i, voter) in voters.iter().enumerate() {
        let polarity = if i % 2 == 0 { Polarity::Upvote } else { Polarity::Downvote };
        ledger.cast_vote(Some(voter), &post, polarity).await.unwrap();
    }
    ledger.cast_vote(Some(&voters[0]), &post, Polarity::Downvote).await.unwrap();
    ledger.cast_vote(Some(&voters[1]), &post, Polarity::Downvote).await.unwrap();

    let audit = ledger.audit_counters(&post).await.unwrap();
    assert!(audit.is_consistent(), "drift: {audit:?}");
    assert_eq!(audit.stored, VoteTally { upvotes: 2, downvotes: 2 });
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_toggles_by_one_voter(pool: sqlx::PgPool) {
    let (ledger, _) = ledger(&pool);
    let voter = VoterId::new();
    let post = new_post(&ledger, &voter).await;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = ledger.clone();
            tokio::spawn(async move {
                ledger.cast_vote(Some(&voter), &post, Polarity::Upvote).await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(counters(&ledger, &post).await, (0, 0));
    assert!(ledger.audit_counters(&post).await.unwrap().is_consistent());
}

// ============================================================================
// Transactions and constraints
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_dropped_transaction_rolls_back(pool: sqlx::PgPool) {
    let (ledger, store) = ledger(&pool);
    let voter = VoterId::new();
    let post = new_post(&ledger, &voter).await;

    {
        let mut txn = store.begin().await.unwrap();
        txn.lock_post(&post).await.unwrap().unwrap();
        txn.insert_vote(&Vote::new(post, voter, Polarity::Upvote))
            .await
            .unwrap();
        let value = txn
            .adjust_counter(&post, CounterField::Upvotes, CounterDelta::Increment)
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    assert!(store.find_vote(&post, &voter).await.unwrap().is_none());
    assert_eq!(counters(&ledger, &post).await, (0, 0));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_member_count_is_rejected(pool: sqlx::PgPool) {
    let (ledger, store) = ledger(&pool);
    let post = new_post(&ledger, &VoterId::new()).await;

    let mut txn = store.begin().await.unwrap();
    let err = txn
        .adjust_counter(&post, CounterField::MemberCount, CounterDelta::Increment)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(ref m) if m.contains("member_count")));
}

#[sqlx::test(migrations = "./migrations")]
async fn test_duplicate_vote_conflicts(pool: sqlx::PgPool) {
    let (ledger, store) = ledger(&pool);
    let voter = VoterId::new();
    let post = new_post(&ledger, &voter).await;

    let mut txn = store.begin().await.unwrap();
    txn.insert_vote(&Vote::new(post, voter, Polarity::Upvote))
        .await
        .unwrap();
    let err = txn
        .insert_vote(&Vote::new(post, voter, Polarity::Downvote))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)), "got {err:?}");
}

#[sqlx::test(migrations = "./migrations")]
async fn test_vote_on_unknown_post_is_integrity_error(pool: sqlx::PgPool) {
    let (_, store) = ledger(&pool);

    let mut txn = store.begin().await.unwrap();
    let err = txn
        .insert_vote(&Vote::new(PostId::new(), VoterId::new(), Polarity::Upvote))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Integrity(_)), "got {err:?}");
}

// ============================================================================
// Comments and post deletion
// ============================================================================

#[sqlx::test(migrations = "./migrations")]
async fn test_comments_move_comment_count(pool: sqlx::PgPool) {
    let (ledger, _) = ledger(&pool);
    let (seller, buyer) = (VoterId::new(), VoterId::new());
    let post = new_post(&ledger, &seller).await;

    let first = ledger.add_comment(Some(&buyer), &post, "Still for sale?").await.unwrap();
    assert_eq!(first.comment_count, 1);
    let second = ledger.add_comment(Some(&seller), &post, "Yes").await.unwrap();
    assert_eq!(second.comment_count, 2);

    let listed = ledger.list_comments(&post).await.unwrap();
    assert_eq!(listed.len(), 2);

    assert!(matches!(
        ledger.delete_comment(Some(&seller), &first.comment.id).await,
        Err(VoteError::Forbidden(_))
    ));
    let removed = ledger.delete_comment(Some(&buyer), &first.comment.id).await.unwrap();
    assert_eq!(removed.comment_count, 1);
    assert_eq!(ledger.get_post(&post).await.unwrap().comment_count, 1);
    assert_eq!(row_count(&pool, "post_comments", &post).await, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_delete_post_removes_votes_and_comments(pool: sqlx::PgPool) {
    let (ledger, store) = ledger(&pool);
    let (author, voter) = (VoterId::new(), VoterId::new());
    let post = new_post(&ledger, &author).await;
    ledger.cast_vote(Some(&voter), &post, Polarity::Upvote).await.unwrap();
    ledger.cast_vote(Some(&author), &post, Polarity::Downvote).await.unwrap();
    ledger.add_comment(Some(&voter), &post, "Nice").await.unwrap();

    assert!(matches!(
        ledger.delete_post(Some(&voter), &post).await,
        Err(VoteError::Forbidden(_))
    ));
    assert_eq!(row_count(&pool, "post_votes", &post).await, 2);

    ledger.delete_post(Some(&author), &post).await.unwrap();

    assert!(store.get_post(&post).await.unwrap().is_none());
    assert_eq!(row_count(&pool, "post_votes", &post).await, 0);
    assert_eq!(row_count(&pool, "post_comments", &post).await, 0);
    assert!(matches!(
        ledger.cast_vote(Some(&voter), &post, Polarity::Upvote).await,
        Err(VoteError::NotFound(_))
    ));
    assert!(matches!(
        ledger.delete_post(Some(&author), &post).await,
        Err(VoteError::NotFound(_))
    ));
}
