//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all [`GitRepo`](crate::GitRepo)
//! trait methods. Variants are rich enough that callers can match on specific
//! failure modes (timeout, non-fast-forward, missing worktree) without
//! parsing stderr text.

use thiserror::Error;

/// Errors returned by [`GitRepo`](crate::GitRepo) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested ref, worktree, or object was not found.
    #[error("not found: {message}")]
    NotFound {
        /// What was missing.
        message: String,
    },

    /// A git subprocess exited with a non-zero status.
    #[error("`git {command}` failed (exit code {exit_code:?}): {stderr}")]
    CommandFailed {
        /// The git subcommand and arguments that were run (joined by spaces).
        command: String,
        /// Captured stderr, trimmed.
        stderr: String,
        /// Process exit code, if the process actually exited.
        exit_code: Option<i32>,
    },

    /// A network git command (fetch/push) exceeded its configured timeout
    /// and was killed (`SIGTERM` then `SIGKILL`).
    #[error("`git {command}` timed out after {timeout_secs}s and was killed")]
    Timeout {
        /// The git subcommand and arguments that were run.
        command: String,
        /// The timeout that was exceeded.
        timeout_secs: u64,
    },

    /// A push was rejected because the remote ref has moved ahead
    /// (non-fast-forward). Distinct from [`GitError::CommandFailed`] so
    /// callers can decide to retry.
    #[error("push to `{remote}` rejected: `{remote_ref}` is not a fast-forward")]
    NonFastForward {
        /// The remote name (e.g. `"origin"`).
        remote: String,
        /// The remote ref that rejected the push.
        remote_ref: String,
    },

    /// The repository has no remote configured with the given name.
    #[error("no remote named `{remote}`")]
    NoRemote {
        /// The remote name that was requested.
        remote: String,
    },

    /// A worktree operation failed because the worktree administrative
    /// state is inconsistent (missing `.git` pointer, wrong branch, etc.).
    #[error("worktree `{name}` is in an inconsistent state: {detail}")]
    WorktreeError {
        /// The worktree's name.
        name: String,
        /// What was wrong with it.
        detail: String,
    },

    /// An I/O error occurred (file system, process spawn, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// The underlying gix backend returned an error with no more specific
    /// variant here (object decode failure, malformed ref, etc.).
    #[error("git backend error: {message}")]
    Backend {
        /// Freeform error description from gix.
        message: String,
    },
}

impl GitError {
    /// Build a [`GitError::CommandFailed`] from a completed git invocation.
    #[must_use]
    pub fn command_failed(args: &[&str], stderr: &str, exit_code: Option<i32>) -> Self {
        Self::CommandFailed {
            command: args.join(" "),
            stderr: stderr.trim().to_owned(),
            exit_code,
        }
    }
}
