//! Git abstraction layer for eluent.
//!
//! Exposes [`GitRepo`], a trait covering exactly the porcelain-level git
//! operations the claim and sync protocols need (refs, worktrees, fetch,
//! push, commit), plus [`GixGitRepo`], the gix-backed implementation.
//! Callers depend on the trait, not the implementation, so tests can
//! supply a double.

mod error;
mod gix_repo;
mod network;
mod objects;
mod process;
mod refs;
mod repo;
mod types;
mod worktree;

pub use error::GitError;
pub use gix_repo::GixGitRepo;
pub use repo::GitRepo;
pub use types::{GitOid, PushOutcome, RefName, WorktreeInfo};
