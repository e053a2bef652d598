//! # API Route Modules
//!
//! - `posts`: post registry (create, fetch, author-only delete).
//! - `comments`: comments on posts, which move `comment_count`.
//! - `votes`: vote casting, vote state reads, the caller's own vote, and
//!   the counter audit.

pub mod comments;
pub mod posts;
pub mod votes;
