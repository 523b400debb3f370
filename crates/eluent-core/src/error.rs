//! The unified error type for eluent's domain operations.
//!
//! Every variant is meant to be read by an autonomous agent as well as a
//! human: each carries enough context to decide the next action, and
//! `Display` appends a "To fix:" hint naming the concrete recovery step.

use std::fmt;
use std::path::PathBuf;

use crate::model::types::ValidationError;

/// Unified error type for eluent operations.
#[derive(Debug)]
pub enum EluentError {
    /// No atom matches the given ID or short ID.
    AtomNotFound {
        /// The ID or prefix that was looked up.
        id: String,
    },

    /// A short ID prefix matched more than one atom.
    AmbiguousId {
        /// The prefix that was looked up.
        prefix: String,
        /// Full IDs of every atom the prefix matched.
        candidates: Vec<String>,
    },

    /// An atom ID, title, or other field failed validation.
    Validation(ValidationError),

    /// Adding a blocking bond would introduce a cycle in the dependency
    /// graph.
    BondCycle {
        /// The atom the new bond would originate from.
        from: String,
        /// The atom the new bond would point to.
        to: String,
    },

    /// A bond referenced an atom (source or target) that does not exist.
    DanglingBond {
        /// The missing atom's ID.
        atom_id: String,
    },

    /// The repository's on-disk state (a JSONL file, the index, or
    /// `.sync-state`) is corrupted or internally inconsistent.
    RepoCorrupted {
        /// Path to the offending file.
        path: PathBuf,
        /// Human-readable description of the corruption.
        detail: String,
    },

    /// A claim attempt could not proceed because the atom is already
    /// claimed by another agent, or is not in a claimable state.
    ClaimConflict {
        /// The atom that could not be claimed.
        atom_id: String,
        /// Why the claim was refused.
        reason: String,
    },

    /// A three-way merge produced conflicting field values that could not
    /// be resolved automatically.
    MergeConflict {
        /// The atom whose fields conflicted.
        atom_id: String,
        /// Names of the fields that conflicted.
        fields: Vec<String>,
    },

    /// A git operation failed.
    Git(eluent_git::GitError),

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An I/O error occurred during a repository operation.
    Io(std::io::Error),
}

impl fmt::Display for EluentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtomNotFound { id } => write!(
                f,
                "atom '{id}' not found.\n  To fix: check the ID with `eluent list`, or use a longer prefix."
            ),
            Self::AmbiguousId { prefix, candidates } => {
                write!(f, "'{prefix}' matches {} atoms:", candidates.len())?;
                for c in candidates {
                    write!(f, "\n  - {c}")?;
                }
                write!(f, "\n  To fix: use a longer prefix, or the full ID.")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::BondCycle { from, to } => write!(
                f,
                "adding a bond from '{from}' to '{to}' would create a dependency cycle.\n  To fix: remove or redirect one of the bonds on this path first."
            ),
            Self::DanglingBond { atom_id } => write!(
                f,
                "bond references atom '{atom_id}', which does not exist.\n  To fix: create the atom first, or remove the bond."
            ),
            Self::RepoCorrupted { path, detail } => write!(
                f,
                "repository state in '{}' is corrupted: {detail}\n  To fix: inspect the file by hand, or restore it from the last known-good git commit.",
                path.display()
            ),
            Self::ClaimConflict { atom_id, reason } => write!(
                f,
                "cannot claim '{atom_id}': {reason}\n  To fix: pick a different ready atom, or wait for the current claim to be released."
            ),
            Self::MergeConflict { atom_id, fields } => {
                write!(f, "merge conflict on atom '{atom_id}' in field(s): {}", fields.join(", "))?;
                write!(f, "\n  To fix: resolve manually with `eluent sync --interactive`, or accept one side with `--ours`/`--theirs`.")
            }
            Self::Git(err) => write!(f, "{err}\n  To fix: check `git status` in the repository and retry."),
            Self::Config { path, detail } => write!(
                f,
                "configuration error in '{}': {detail}\n  To fix: edit the config file and correct the issue.",
                path.display()
            ),
            Self::Io(err) => write!(
                f,
                "I/O error: {err}\n  To fix: check file permissions and available disk space."
            ),
        }
    }
}

impl std::error::Error for EluentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Git(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for EluentError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<eluent_git::GitError> for EluentError {
    fn from(err: eluent_git::GitError) -> Self {
        Self::Git(err)
    }
}

impl From<ValidationError> for EluentError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(err)
    }
}
