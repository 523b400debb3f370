//! The [`GitRepo`] trait — the single abstraction boundary between eluent's
//! core crate and git.
//!
//! Unlike a general-purpose git abstraction, eluent never manipulates git
//! trees or blobs directly: the ledger branch and the synced repository are
//! both plain working trees containing JSONL files, and eluent reads/writes
//! those files with ordinary `std::fs` calls. This trait therefore only
//! covers the *porcelain* surface the claim and sync protocols need: refs,
//! worktrees, fetch/push, and commit.
//!
//! # Object safety
//!
//! This trait is object-safe: no generic methods, no `Self` in return
//! position outside of `Result`. Callers may use `&dyn GitRepo` or
//! `Box<dyn GitRepo>`.

use std::path::Path;
use std::time::Duration;

use crate::error::GitError;
use crate::types::{GitOid, PushOutcome, RefName, WorktreeInfo};

/// The git abstraction trait used by `eluent-core`.
pub trait GitRepo {
    /// Resolve a revision spec (branch, tag, `HEAD`, short OID, ...) to a
    /// full [`GitOid`]. Returns `None` if the spec cannot be resolved.
    ///
    /// Replaces: `git rev-parse <spec>`.
    fn rev_parse(&self, spec: &str) -> Result<Option<GitOid>, GitError>;

    /// Return `true` if `ancestor` is an ancestor of (or equal to)
    /// `descendant` — used to decide whether a worktree can fast-forward.
    ///
    /// Replaces: `git merge-base --is-ancestor <ancestor> <descendant>`.
    fn is_ancestor(&self, ancestor: &GitOid, descendant: &GitOid) -> Result<bool, GitError>;

    /// The branch currently checked out at `worktree_path`, or `None` if
    /// detached.
    ///
    /// Replaces: `git -C <path> symbolic-ref --short HEAD`.
    fn current_branch(&self, worktree_path: &Path) -> Result<Option<String>, GitError>;

    /// Create a linked worktree at `path` checked out to `branch`.
    ///
    /// If `branch` does not exist yet, it is created from `start_point`
    /// (commit-ish; `None` means the repository's default branch tip).
    ///
    /// Replaces: `git worktree add [-b <branch>] <path> [<start_point>]`.
    fn worktree_add(
        &self,
        path: &Path,
        branch: &str,
        start_point: Option<&str>,
    ) -> Result<(), GitError>;

    /// Remove a linked worktree. `force` discards uncommitted local changes.
    ///
    /// Replaces: `git worktree remove [--force] <path>`.
    fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), GitError>;

    /// List all worktrees (main + linked) known to the repository.
    ///
    /// Replaces: `git worktree list --porcelain`.
    fn worktree_list(&self) -> Result<Vec<WorktreeInfo>, GitError>;

    /// Remove administrative metadata for worktrees whose directories were
    /// deleted out from under git.
    ///
    /// Replaces: `git worktree prune`.
    fn worktree_prune(&self) -> Result<(), GitError>;

    /// Delete a local branch. A no-op if it does not exist.
    ///
    /// Replaces: `git branch -D <name>`.
    fn delete_branch(&self, name: &str) -> Result<(), GitError>;

    /// Stage every change under `worktree_path` and create a commit, using
    /// that worktree's checked-out branch as HEAD. Returns the new commit's
    /// OID, or `None` if there was nothing to commit.
    ///
    /// Replaces: `git -C <path> add -A && git -C <path> commit -m <message>`.
    fn commit_all(
        &self,
        worktree_path: &Path,
        message: &str,
    ) -> Result<Option<GitOid>, GitError>;

    /// Fetch `refname` from `remote` into the local repository, subject to
    /// `timeout`.
    ///
    /// Replaces: `git fetch <remote> <refname>`.
    fn fetch(&self, remote: &str, refname: &RefName, timeout: Duration) -> Result<(), GitError>;

    /// Fast-forward `worktree_path`'s checked-out branch to match the
    /// corresponding remote-tracking ref (assumed already fetched).
    ///
    /// Replaces: `git -C <path> merge --ff-only <remote>/<branch>`.
    fn fast_forward(&self, worktree_path: &Path, remote: &str, branch: &str) -> Result<(), GitError>;

    /// Push `local_ref` to `remote`'s `remote_ref`, subject to `timeout`.
    ///
    /// Distinguishes a non-fast-forward rejection ([`PushOutcome::Rejected`])
    /// from other failures, which are returned as `Err`.
    ///
    /// Replaces: `git push <remote> <local_ref>:<remote_ref>`.
    fn push(
        &self,
        remote: &str,
        local_ref: &RefName,
        remote_ref: &RefName,
        timeout: Duration,
    ) -> Result<PushOutcome, GitError>;
}
