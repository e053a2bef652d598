//! # unimarket-votes: Community Post Vote Ledger
//!
//! Maintains one vote per (post, voter) and keeps each post's denormalized
//! `upvotes` / `downvotes` counters equal to the number of matching vote
//! records.
//!
//! ## Resolution
//!
//! ```text
//! existing   requested   resolution      counters
//! ────────   ─────────   ──────────      ────────
//! none       P           create Vote(P)  +P
//! P          P           delete Vote     -P
//! Q          P           update to P     -Q +P
//! ```
//!
//! ## Atomicity
//!
//! Every cast runs inside one [`VoteTxn`]: the post is locked, the
//! existing vote is read, the vote row and the counters are written, and
//! the transaction commits. A transaction dropped before
//! [`VoteTxn::commit`] rolls back, so a failure or a cancelled future
//! leaves no partial state behind.
//!
//! ## Ownership
//!
//! Posts and comments record their author. Only the author may delete
//! them; deleting a post removes its votes and comments with it.
//!
//! ## Storage
//!
//! [`VoteStore`] is the persistence seam. [`MemoryVoteStore`] ships here;
//! the Postgres implementation lives in `unimarket-api`.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod model;
pub mod resolution;
pub mod store;

pub use error::{StoreError, VoteError};
pub use ledger::{CastOutcome, CommentOutcome, VoteLedger};
pub use memory::MemoryVoteStore;
pub use model::{Comment, CounterAudit, Post, Vote, VoteState, VoteTally};
pub use resolution::{resolve, Resolution};
pub use store::{VoteStore, VoteTxn};
