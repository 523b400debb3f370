//! The bond: a directed dependency edge between two atoms.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::{AtomId, ErrorKind, ValidationError};

/// The closed set of dependency edge kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    /// Source must close before target is unblocked.
    Blocks,
    /// Source is target's parent in the atom tree; also blocks.
    ParentChild,
    /// Source must close; blocks or releases depending on `close_reason`.
    ConditionalBlocks,
    /// Target is blocked while source (or its blocking descendants) remain open.
    WaitsFor,
    /// Informational link; never blocks.
    Related,
    /// Marks target as a duplicate of source; never blocks.
    Duplicates,
    /// Marks target as discovered while working source; never blocks.
    DiscoveredFrom,
    /// Marks target as a reply/comment-thread link to source; never blocks.
    RepliesTo,
}

impl DependencyType {
    /// Whether this dependency type participates in readiness blocking.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::Blocks | Self::ParentChild | Self::ConditionalBlocks | Self::WaitsFor
        )
    }
}

impl fmt::Display for DependencyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Blocks => "blocks",
            Self::ParentChild => "parent_child",
            Self::ConditionalBlocks => "conditional_blocks",
            Self::WaitsFor => "waits_for",
            Self::Related => "related",
            Self::Duplicates => "duplicates",
            Self::DiscoveredFrom => "discovered_from",
            Self::RepliesTo => "replies_to",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for DependencyType {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "blocks" => Ok(Self::Blocks),
            "parent_child" => Ok(Self::ParentChild),
            "conditional_blocks" => Ok(Self::ConditionalBlocks),
            "waits_for" => Ok(Self::WaitsFor),
            "related" => Ok(Self::Related),
            "duplicates" => Ok(Self::Duplicates),
            "discovered_from" => Ok(Self::DiscoveredFrom),
            "replies_to" => Ok(Self::RepliesTo),
            other => Err(ValidationError {
                kind: ErrorKind::DependencyType,
                value: other.to_owned(),
                reason: "not a recognised dependency type".to_owned(),
            }),
        }
    }
}

/// A directed dependency edge. Identity is the triple
/// `(source_id, target_id, dependency_type)`; bonds are immutable once
/// created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    /// The edge's origin atom.
    pub source_id: AtomId,
    /// The edge's destination atom.
    pub target_id: AtomId,
    /// What kind of dependency this edge represents.
    pub dependency_type: DependencyType,
    /// When the bond was created.
    pub created_at: DateTime<Utc>,
    /// Arbitrary metadata, preserved verbatim across sync.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Fields written by a newer version of eluent; carried through
    /// untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Bond {
    /// Construct a bond, rejecting self-references.
    ///
    /// # Errors
    /// Returns [`ErrorKind::SelfReference`] if `source_id == target_id`.
    pub fn new(
        source_id: AtomId,
        target_id: AtomId,
        dependency_type: DependencyType,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if source_id == target_id {
            return Err(ValidationError {
                kind: ErrorKind::SelfReference,
                value: source_id.to_string(),
                reason: "a bond's source and target must be distinct atoms".to_owned(),
            });
        }
        Ok(Self {
            source_id,
            target_id,
            dependency_type,
            created_at,
            metadata: BTreeMap::new(),
            extra: BTreeMap::new(),
        })
    }

    /// The `(source, target, type)` identity triple.
    #[must_use]
    pub fn identity(&self) -> (AtomId, AtomId, DependencyType) {
        (self.source_id.clone(), self.target_id.clone(), self.dependency_type)
    }
}
