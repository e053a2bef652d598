//! # OpenAPI Specification Assembly
//!
//! Assembles the utoipa-documented routes into one OpenAPI document served
//! at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Unimarket Community Votes API",
        version = "0.1.0",
        description = "Post registry, comments, and toggle-style voting with counters kept in step with vote records.",
        license(name = "MIT")
    ),
    paths(
        // Posts
        crate::routes::posts::create_post,
        crate::routes::posts::get_post,
        crate::routes::posts::delete_post,
        // Comments
        crate::routes::comments::create_comment,
        crate::routes::comments::list_comments,
        crate::routes::comments::delete_comment,
        // Votes
        crate::routes::votes::cast_vote,
        crate::routes::votes::get_vote_state,
        crate::routes::votes::get_user_vote,
        crate::routes::votes::audit_counters,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::routes::posts::CreatePostRequest,
        crate::routes::posts::PostResponse,
        crate::routes::comments::CreateCommentRequest,
        crate::routes::comments::CommentResponse,
        crate::routes::comments::CommentOutcomeResponse,
        crate::routes::votes::CastVoteRequest,
        crate::routes::votes::CastVoteResponse,
        crate::routes::votes::VoteResponse,
        crate::routes::votes::VoteStateResponse,
        crate::routes::votes::UserVoteResponse,
        crate::routes::votes::TallyResponse,
        crate::routes::votes::CounterAuditResponse,
    )),
    tags(
        (name = "posts", description = "Post registry"),
        (name = "comments", description = "Comments on posts"),
        (name = "votes", description = "Vote casting and vote state"),
    )
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
