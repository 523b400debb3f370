//! Core types for the eluent git abstraction layer.
//!
//! These types form the vocabulary shared between the [`GitRepo`](crate::GitRepo)
//! trait and its callers. They intentionally contain no `gix` types —
//! the backend is an implementation detail of [`crate::gix_repo`].

use std::fmt;
use std::str::FromStr;

use crate::error::GitError;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1 or SHA-256 hex, as returned by the local
/// git install). Stored as the hex string git itself prints — this crate
/// never computes hashes, only parses and compares what git reports.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid(String);

impl GitOid {
    /// Create a `GitOid` from a hex string, validating its shape.
    ///
    /// # Errors
    /// Returns an error if the string is not 40 (SHA-1) or 64 (SHA-256)
    /// lowercase hex characters.
    pub fn new(s: &str) -> Result<Self, GitError> {
        let len = s.len();
        if len != 40 && len != 64 {
            return Err(GitError::InvalidOid {
                value: s.to_owned(),
                reason: format!("expected 40 or 64 hex characters, got {len}"),
            });
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
            return Err(GitError::InvalidOid {
                value: s.to_owned(),
                reason: "must contain only lowercase hex characters".to_owned(),
            });
        }
        Ok(Self(s.to_owned()))
    }

    /// Return the OID as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for GitOid {
    type Err = GitError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

// ---------------------------------------------------------------------------
// RefName
// ---------------------------------------------------------------------------

/// A validated git ref name, e.g. `refs/heads/eluent-ledger`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RefName(String);

const BARE_REFS: &[&str] = &["HEAD", "FETCH_HEAD", "MERGE_HEAD", "ORIG_HEAD"];

impl RefName {
    /// Create a new `RefName`, validating that it looks like a git ref.
    ///
    /// # Errors
    /// Returns an error if the name is empty and isn't a well-known bare ref
    /// or a `refs/...` path.
    pub fn new(name: impl Into<String>) -> Result<Self, GitError> {
        let name = name.into();
        if name.is_empty() {
            return Err(GitError::InvalidOid {
                value: name,
                reason: "ref name must not be empty".to_owned(),
            });
        }
        if name.starts_with("refs/") || BARE_REFS.contains(&name.as_str()) {
            Ok(Self(name))
        } else {
            Err(GitError::InvalidOid {
                value: name,
                reason: "ref name must start with 'refs/' or be a well-known ref".to_owned(),
            })
        }
    }

    /// Build the fully qualified local branch ref for a short branch name.
    #[must_use]
    pub fn branch(short_name: &str) -> Self {
        Self(format!("refs/heads/{short_name}"))
    }

    /// Return the ref name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RefName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// WorktreeInfo
// ---------------------------------------------------------------------------

/// A single entry from `git worktree list`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorktreeInfo {
    /// Absolute path to the worktree's working directory.
    pub path: std::path::PathBuf,
    /// The commit the worktree's HEAD points to, if resolvable.
    pub head: Option<GitOid>,
    /// The branch checked out in the worktree, if any (detached otherwise).
    pub branch: Option<RefName>,
}

/// The outcome of a push attempt, distinguishing a rejected (non-fast-forward)
/// push from success so the claim protocol's retry loop can decide what to do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PushOutcome {
    /// The push updated the remote ref.
    Accepted,
    /// The push was rejected because the remote moved; caller should fetch
    /// and retry.
    Rejected,
}
