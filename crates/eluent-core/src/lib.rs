//! Core domain logic for eluent: the atom/bond/comment data model, the
//! on-disk JSONL repository, the dependency graph and readiness queries,
//! ID generation and resolution, three-way sync, and the cross-agent
//! claim protocol.
//!
//! This crate never shells out to git itself — it depends on the
//! [`eluent_git::GitRepo`] trait and is agnostic to how its implementation
//! talks to the repository. It also never touches a terminal: logging
//! goes through `tracing`, and installing a subscriber is left to
//! `eluent-cli`.

pub mod claim;
pub mod config;
pub mod error;
pub mod graph;
pub mod id;
pub mod index;
pub mod logging;
pub mod model;
pub mod readiness;
pub mod repo;
pub mod sync;

pub use claim::{ClaimOutcome, ClaimProtocol};
pub use config::Config;
pub use error::EluentError;
pub use index::Indexer;
pub use model::{Atom, AtomId, Bond, Comment, CommentId, IssueType, Priority, RepoName, Status};
pub use repo::Repository;
