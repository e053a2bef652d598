//! # Vote API
//!
//! Casting a vote toggles, switches, or creates the caller's vote on a post
//! and returns the resulting tallies. Reads return the post's counters with
//! the caller's own polarity, which is `null` for anonymous callers.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unimarket_core::{Polarity, PostId, VoteId, VoterId};
use unimarket_votes::{CastOutcome, CounterAudit, Resolution, Vote, VoteState, VoteTally};
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_json, parse_field};
use crate::state::AppState;

/// Request to cast a vote. `vote_type` is parsed into a [`Polarity`] by the handler.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    /// `"upvote"` or `"downvote"`.
    pub vote_type: String,
}

/// Post counters plus the caller's own polarity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoteStateResponse {
    pub upvotes: u64,
    pub downvotes: u64,
    #[schema(value_type = Option<String>)]
    pub user_vote: Option<Polarity>,
}

impl From<VoteState> for VoteStateResponse {
    fn from(state: VoteState) -> Self {
        Self {
            upvotes: state.upvotes,
            downvotes: state.downvotes,
            user_vote: state.user_vote,
        }
    }
}

/// A stored vote record.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoteResponse {
    #[schema(value_type = String)]
    pub id: VoteId,
    #[schema(value_type = String)]
    pub post_id: PostId,
    #[schema(value_type = String)]
    pub voter_id: VoterId,
    #[schema(value_type = String)]
    pub vote_type: Polarity,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Vote> for VoteResponse {
    fn from(vote: Vote) -> Self {
        Self {
            id: vote.id,
            post_id: vote.post_id,
            voter_id: vote.voter_id,
            vote_type: vote.polarity,
            created_at: vote.created_at,
            updated_at: vote.updated_at,
        }
    }
}

/// Result of a cast.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CastVoteResponse {
    /// `"created"`, `"switched"`, or `"removed"`.
    pub resolution: String,
    /// Polarity the vote had before a switch.
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>)]
    pub switched_from: Option<Polarity>,
    /// The vote after the cast; `null` when it was removed.
    pub vote: Option<VoteResponse>,
    pub votes: VoteStateResponse,
}

impl From<CastOutcome> for CastVoteResponse {
    fn from(outcome: CastOutcome) -> Self {
        let switched_from = match outcome.resolution {
            Resolution::Switched { from } => Some(from),
            Resolution::Created | Resolution::Removed => None,
        };
        Self {
            resolution: outcome.resolution.as_str().to_string(),
            switched_from,
            vote: outcome.vote.map(VoteResponse::from),
            votes: outcome.state.into(),
        }
    }
}

/// The caller's own vote on a post.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserVoteResponse {
    #[schema(value_type = String)]
    pub post_id: PostId,
    #[schema(value_type = Option<String>)]
    pub user_vote: Option<Polarity>,
}

/// Upvote and downvote counts.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TallyResponse {
    pub upvotes: u64,
    pub downvotes: u64,
}

impl From<VoteTally> for TallyResponse {
    fn from(tally: VoteTally) -> Self {
        Self {
            upvotes: tally.upvotes,
            downvotes: tally.downvotes,
        }
    }
}

/// Stored counters compared with a recount of vote records.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CounterAuditResponse {
    #[schema(value_type = String)]
    pub post_id: PostId,
    pub stored: TallyResponse,
    pub counted: TallyResponse,
    pub consistent: bool,
}

impl From<CounterAudit> for CounterAuditResponse {
    fn from(audit: CounterAudit) -> Self {
        Self {
            post_id: audit.post_id,
            consistent: audit.is_consistent(),
            stored: audit.stored.into(),
            counted: audit.counted.into(),
        }
    }
}

/// Build the votes router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/posts/:id/votes", post(cast_vote).get(get_vote_state))
        .route("/v1/posts/:id/votes/me", get(get_user_vote))
        .route("/v1/posts/:id/votes/audit", get(audit_counters))
}

fn voter(caller: &Option<CallerIdentity>) -> Option<&VoterId> {
    caller.as_ref().map(|c| &c.voter_id)
}

/// POST /v1/posts/:id/votes: cast, switch, or retract the caller's vote.
#[utoipa::path(
    post,
    path = "/v1/posts/{id}/votes",
    params(("id" = String, Path, description = "Post UUID")),
    request_body = CastVoteRequest,
    responses(
        (status = 200, description = "Vote applied", body = CastVoteResponse),
        (status = 400, description = "Malformed JSON body", body = crate::error::ErrorBody),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
        (status = 422, description = "Unknown vote type or malformed id", body = crate::error::ErrorBody),
    ),
    tag = "votes"
)]
pub async fn cast_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Option<CallerIdentity>,
    body: Result<Json<CastVoteRequest>, JsonRejection>,
) -> Result<Json<CastVoteResponse>, AppError> {
    let post_id: PostId = parse_field(&id)?;
    let polarity: Polarity = parse_field(&extract_json(body)?.vote_type)?;

    let outcome = state
        .ledger
        .cast_vote(voter(&caller), &post_id, polarity)
        .await?;
    Ok(Json(outcome.into()))
}

/// GET /v1/posts/:id/votes: counters plus the caller's polarity.
#[utoipa::path(
    get,
    path = "/v1/posts/{id}/votes",
    params(("id" = String, Path, description = "Post UUID")),
    responses(
        (status = 200, description = "Current vote state", body = VoteStateResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed post id", body = crate::error::ErrorBody),
    ),
    tag = "votes"
)]
pub async fn get_vote_state(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Option<CallerIdentity>,
) -> Result<Json<VoteStateResponse>, AppError> {
    let post_id: PostId = parse_field(&id)?;
    let vote_state = state
        .ledger
        .get_vote_state(&post_id, voter(&caller))
        .await?;
    Ok(Json(vote_state.into()))
}

/// GET /v1/posts/:id/votes/me: the caller's own polarity, `null` if none.
#[utoipa::path(
    get,
    path = "/v1/posts/{id}/votes/me",
    params(("id" = String, Path, description = "Post UUID")),
    responses(
        (status = 200, description = "Caller's vote", body = UserVoteResponse),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed post id", body = crate::error::ErrorBody),
    ),
    tag = "votes"
)]
pub async fn get_user_vote(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Option<CallerIdentity>,
) -> Result<Json<UserVoteResponse>, AppError> {
    let post_id: PostId = parse_field(&id)?;
    let user_vote = state
        .ledger
        .get_user_vote(&post_id, voter(&caller))
        .await?;
    Ok(Json(UserVoteResponse { post_id, user_vote }))
}

/// GET /v1/posts/:id/votes/audit: recount votes and compare with the counters.
#[utoipa::path(
    get,
    path = "/v1/posts/{id}/votes/audit",
    params(("id" = String, Path, description = "Post UUID")),
    responses(
        (status = 200, description = "Audit result", body = CounterAuditResponse),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
    ),
    tag = "votes"
)]
pub async fn audit_counters(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: CallerIdentity,
) -> Result<Json<CounterAuditResponse>, AppError> {
    let post_id: PostId = parse_field(&id)?;
    let audit = state.ledger.audit_counters(&post_id).await?;
    tracing::info!(
        post_id = %post_id,
        requested_by = %caller.voter_id,
        consistent = audit.is_consistent(),
        "counter audit"
    );
    Ok(Json(audit.into()))
}
