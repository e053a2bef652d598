//! # Comment API
//!
//! Comments are what a post's `comment_count` counts. Adding or deleting
//! one moves the counter in the same transaction as the comment row.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unimarket_core::{CommentBody, CommentId, PostId, VoterId};
use unimarket_votes::{Comment, CommentOutcome};
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_field, Validate};
use crate::state::AppState;

/// Request to comment on a post.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateCommentRequest {
    pub content: String,
}

impl Validate for CreateCommentRequest {
    fn validate(&self) -> Result<(), String> {
        CommentBody::new(self.content.as_str())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// A stored comment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentResponse {
    #[schema(value_type = String)]
    pub id: CommentId,
    #[schema(value_type = String)]
    pub post_id: PostId,
    #[schema(value_type = String)]
    pub author_id: VoterId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<Comment> for CommentResponse {
    fn from(comment: Comment) -> Self {
        Self {
            id: comment.id,
            post_id: comment.post_id,
            author_id: comment.author_id,
            content: comment.body.into(),
            created_at: comment.created_at,
        }
    }
}

/// A comment plus the post's `comment_count` after the change.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CommentOutcomeResponse {
    pub comment: CommentResponse,
    pub comment_count: u64,
}

impl From<CommentOutcome> for CommentOutcomeResponse {
    fn from(outcome: CommentOutcome) -> Self {
        Self {
            comment: outcome.comment.into(),
            comment_count: outcome.comment_count,
        }
    }
}

/// Build the comments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/v1/posts/:id/comments",
            post(create_comment).get(list_comments),
        )
        .route("/v1/comments/:id", delete(delete_comment))
}

fn caller_id(caller: &Option<CallerIdentity>) -> Option<&VoterId> {
    caller.as_ref().map(|c| &c.voter_id)
}

/// POST /v1/posts/:id/comments: comment on a post.
#[utoipa::path(
    post,
    path = "/v1/posts/{id}/comments",
    params(("id" = String, Path, description = "Post UUID")),
    request_body = CreateCommentRequest,
    responses(
        (status = 201, description = "Comment added", body = CommentOutcomeResponse),
        (status = 400, description = "Malformed JSON body", body = crate::error::ErrorBody),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
        (status = 422, description = "Empty or overlong content", body = crate::error::ErrorBody),
    ),
    tag = "comments"
)]
pub async fn create_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Option<CallerIdentity>,
    body: Result<Json<CreateCommentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CommentOutcomeResponse>), AppError> {
    let post_id: PostId = parse_field(&id)?;
    let req = extract_validated_json(body)?;
    let outcome = state
        .ledger
        .add_comment(caller_id(&caller), &post_id, &req.content)
        .await?;
    Ok((StatusCode::CREATED, Json(outcome.into())))
}

/// GET /v1/posts/:id/comments: comments on a post, oldest first.
#[utoipa::path(
    get,
    path = "/v1/posts/{id}/comments",
    params(("id" = String, Path, description = "Post UUID")),
    responses(
        (status = 200, description = "Comments", body = [CommentResponse]),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed post id", body = crate::error::ErrorBody),
    ),
    tag = "comments"
)]
pub async fn list_comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CommentResponse>>, AppError> {
    let post_id: PostId = parse_field(&id)?;
    let comments = state.ledger.list_comments(&post_id).await?;
    Ok(Json(comments.into_iter().map(CommentResponse::from).collect()))
}

/// DELETE /v1/comments/:id: remove the caller's own comment.
#[utoipa::path(
    delete,
    path = "/v1/comments/{id}",
    params(("id" = String, Path, description = "Comment UUID")),
    responses(
        (status = 200, description = "Comment deleted", body = CommentOutcomeResponse),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not the author", body = crate::error::ErrorBody),
        (status = 404, description = "Comment not found", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed comment id", body = crate::error::ErrorBody),
    ),
    tag = "comments"
)]
pub async fn delete_comment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Option<CallerIdentity>,
) -> Result<Json<CommentOutcomeResponse>, AppError> {
    let comment_id: CommentId = parse_field(&id)?;
    let outcome = state
        .ledger
        .delete_comment(caller_id(&caller), &comment_id)
        .await?;
    Ok(Json(outcome.into()))
}
