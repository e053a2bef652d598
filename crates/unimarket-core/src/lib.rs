#![deny(missing_docs)]

//! # unimarket-core: Foundational Types for Community Voting
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies, only `serde`, `thiserror`,
//! and `uuid` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for identifiers.** You cannot pass a [`VoterId`]
//!    where a [`PostId`] is expected.
//!
//! 2. **Closed vocabularies.** [`Polarity`] has exactly two values and
//!    [`CounterField`] is the only way storage code can name a counter
//!    column. Free-form strings are parsed once, at the boundary, and
//!    rejected with a [`ValidationError`].

pub mod comment;
pub mod counter;
pub mod error;
pub mod identity;
pub mod polarity;
pub mod post;

pub use comment::{CommentBody, MAX_COMMENT_CHARS};
pub use counter::{CounterDelta, CounterField};
pub use error::ValidationError;
pub use identity::{CommentId, PostId, VoteId, VoterId};
pub use polarity::Polarity;
pub use post::{PostTitle, MAX_TITLE_CHARS};
