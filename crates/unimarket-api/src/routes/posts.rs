//! # Post Registry API
//!
//! Creates posts with zeroed counters, serves them back with their
//! current tallies, and lets the author delete them.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unimarket_core::{PostId, PostTitle, VoterId};
use unimarket_votes::Post;
use utoipa::ToSchema;

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, parse_field, Validate};
use crate::state::AppState;

/// Request to create a post.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePostRequest {
    pub title: String,
}

impl Validate for CreatePostRequest {
    fn validate(&self) -> Result<(), String> {
        PostTitle::new(self.title.as_str())
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// A post and its cached tallies.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PostResponse {
    #[schema(value_type = String)]
    pub id: PostId,
    #[schema(value_type = String)]
    pub author_id: VoterId,
    pub title: String,
    pub upvotes: u64,
    pub downvotes: u64,
    pub comment_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Post> for PostResponse {
    fn from(post: Post) -> Self {
        Self {
            id: post.id,
            author_id: post.author_id,
            title: post.title.as_str().to_string(),
            upvotes: post.upvotes,
            downvotes: post.downvotes,
            comment_count: post.comment_count,
            created_at: post.created_at,
        }
    }
}

/// Build the posts router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/posts", post(create_post))
        .route("/v1/posts/:id", get(get_post).delete(delete_post))
}

/// POST /v1/posts: register a post with zeroed counters.
#[utoipa::path(
    post,
    path = "/v1/posts",
    request_body = CreatePostRequest,
    responses(
        (status = 201, description = "Post created", body = PostResponse),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 422, description = "Invalid title", body = crate::error::ErrorBody),
    ),
    tag = "posts"
)]
pub async fn create_post(
    State(state): State<AppState>,
    caller: Option<CallerIdentity>,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PostResponse>), AppError> {
    let req = extract_validated_json(body)?;
    let post = state
        .ledger
        .create_post(caller.as_ref().map(|c| &c.voter_id), &req.title)
        .await?;
    Ok((StatusCode::CREATED, Json(post.into())))
}

/// GET /v1/posts/:id: fetch a post.
#[utoipa::path(
    get,
    path = "/v1/posts/{id}",
    params(("id" = String, Path, description = "Post UUID")),
    responses(
        (status = 200, description = "Post found", body = PostResponse),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed post id", body = crate::error::ErrorBody),
    ),
    tag = "posts"
)]
pub async fn get_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PostResponse>, AppError> {
    let post_id: PostId = parse_field(&id)?;
    let post = state.ledger.get_post(&post_id).await?;
    Ok(Json(post.into()))
}

/// DELETE /v1/posts/:id: remove a post with its votes and comments.
#[utoipa::path(
    delete,
    path = "/v1/posts/{id}",
    params(("id" = String, Path, description = "Post UUID")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 401, description = "No caller identity", body = crate::error::ErrorBody),
        (status = 403, description = "Caller is not the author", body = crate::error::ErrorBody),
        (status = 404, description = "Post not found", body = crate::error::ErrorBody),
        (status = 422, description = "Malformed post id", body = crate::error::ErrorBody),
    ),
    tag = "posts"
)]
pub async fn delete_post(
    State(state): State<AppState>,
    Path(id): Path<String>,
    caller: Option<CallerIdentity>,
) -> Result<StatusCode, AppError> {
    let post_id: PostId = parse_field(&id)?;
    state
        .ledger
        .delete_post(caller.as_ref().map(|c| &c.voter_id), &post_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
