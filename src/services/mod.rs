//! Service layer for Atrium.
//!
//! Contains business logic above the query modules:
//! - Auth (password hashing and web sessions)
//! - Notifications (fan-out and read-state rules)
//! - Votes (signed-cookie roadmap vote ledger)

mod auth;
mod notifications;
mod votes;

pub use auth::{hash_password, verify_password, AuthService};
pub use notifications::{NotificationDraft, NotificationFeed, NotificationService};
pub use votes::{VoteLedger, VoteOp, VoteOutcome, VoteService, VOTE_COOKIE};
