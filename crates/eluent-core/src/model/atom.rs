//! The atom: eluent's work-item type, plus its status and issue-type value
//! objects.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::types::{AtomId, ErrorKind, ValidationError};

const MAX_TITLE_CHARS: usize = 500;
const MAX_CONTENT_CHARS: usize = 65_536;

/// Normalise a string to NFC and replace invalid sequences (there are none
/// by construction once a `&str` reaches this function, but any lone
/// surrogate artefacts introduced by lossy byte recovery upstream are
/// caught here too) with U+FFFD.
fn normalize(raw: &str) -> String {
    raw.chars().nfc().collect()
}

/// Truncate `s` to at most `max_chars` `char`s, returning whether it was
/// truncated.
fn truncate_chars(s: &str, max_chars: usize) -> (String, bool) {
    if s.chars().count() <= max_chars {
        return (s.to_owned(), false);
    }
    (s.chars().take(max_chars).collect(), true)
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// An atom's lifecycle state.
///
/// `blocked` is deliberately absent: per design, blocking is always a
/// computed property of the dependency graph, never a stored state (see
/// [`crate::graph::blocking`]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Not yet started.
    Open,
    /// Actively claimed and being worked.
    InProgress,
    /// Intentionally postponed past its `defer_until`.
    Deferred,
    /// Finished.
    Closed,
    /// Soft-deleted.
    Discard,
}

impl Status {
    /// Whether a transition from `self` to `next` is permitted.
    ///
    /// `discard` is reachable only from `closed`; `closed` is reachable
    /// from any non-terminal state; every state may revert to `open`.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        match next {
            Self::Open => true,
            Self::Closed => !matches!(self, Self::Discard),
            Self::Discard => matches!(self, Self::Closed),
            Self::InProgress | Self::Deferred => !matches!(self, Self::Discard),
        }
    }

    /// Terminal states are not surfaced by readiness queries and cannot be
    /// claimed.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Discard)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Deferred => "deferred",
            Self::Closed => "closed",
            Self::Discard => "discard",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for Status {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "deferred" => Ok(Self::Deferred),
            "closed" => Ok(Self::Closed),
            "discard" => Ok(Self::Discard),
            other => Err(ValidationError {
                kind: ErrorKind::Status,
                value: other.to_owned(),
                reason: "must be one of open|in_progress|deferred|closed|discard".to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// IssueType
// ---------------------------------------------------------------------------

/// The closed set of issue types.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// A concrete unit of work.
    Task,
    /// A defect to fix.
    Bug,
    /// A user-facing capability.
    Feature,
    /// Maintenance work.
    Chore,
    /// A non-code deliverable (document, asset, dataset).
    Artifact,
    /// An abstract grouping of child atoms.
    Epic,
    /// An abstract template that instantiates concrete atoms.
    Formula,
}

impl IssueType {
    /// Abstract types are excluded from ready queries unless explicitly
    /// requested.
    #[must_use]
    pub const fn is_abstract(self) -> bool {
        matches!(self, Self::Epic | Self::Formula)
    }
}

impl fmt::Display for IssueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Chore => "chore",
            Self::Artifact => "artifact",
            Self::Epic => "epic",
            Self::Formula => "formula",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for IssueType {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "task" => Ok(Self::Task),
            "bug" => Ok(Self::Bug),
            "feature" => Ok(Self::Feature),
            "chore" => Ok(Self::Chore),
            "artifact" => Ok(Self::Artifact),
            "epic" => Ok(Self::Epic),
            "formula" => Ok(Self::Formula),
            other => Err(ValidationError {
                kind: ErrorKind::IssueType,
                value: other.to_owned(),
                reason: "must be one of task|bug|feature|chore|artifact|epic|formula".to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Priority
// ---------------------------------------------------------------------------

/// Priority on a 0 (highest) to 4 (lowest) scale.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Priority(u8);

impl Priority {
    /// Construct a priority, validating the 0..4 range.
    ///
    /// # Errors
    /// Returns an error if `value > 4`.
    pub fn new(value: u8) -> Result<Self, ValidationError> {
        if value > 4 {
            return Err(ValidationError {
                kind: ErrorKind::Priority,
                value: value.to_string(),
                reason: "priority must be in 0..=4".to_owned(),
            });
        }
        Ok(Self(value))
    }

    /// The default priority (2, the midpoint).
    #[must_use]
    pub const fn default_value() -> Self {
        Self(2)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn value(self) -> u8 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::default_value()
    }
}

impl TryFrom<u8> for Priority {
    type Error = ValidationError;
    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Priority> for u8 {
    fn from(p: Priority) -> Self {
        p.0
    }
}

// ---------------------------------------------------------------------------
// Atom
// ---------------------------------------------------------------------------

/// A work item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// Globally unique structured identifier.
    pub id: AtomId,
    /// Short summary, ≤ 500 chars, NFC-normalised.
    pub title: String,
    /// Long-form description, ≤ 65536 chars.
    #[serde(default)]
    pub description: String,
    /// Design notes, ≤ 65536 chars.
    #[serde(default)]
    pub design: String,
    /// Free-form notes, ≤ 65536 chars.
    #[serde(default)]
    pub notes: String,
    /// Lifecycle state.
    pub status: Status,
    /// Closed-set classification.
    pub issue_type: IssueType,
    /// 0 (highest) .. 4 (lowest).
    #[serde(default)]
    pub priority: Priority,
    /// Unordered set of labels.
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// The agent currently responsible for this atom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<String>,
    /// Who created this atom.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,
    /// The parent atom, forming a tree.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<AtomId>,
    /// Do not surface as ready before this time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defer_until: Option<DateTime<Utc>>,
    /// Soft deadline, informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    /// When this atom was closed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Free-text reason given when closing; drives the
    /// `conditional_blocks` failure-pattern check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close_reason: Option<String>,
    /// String-keyed metadata, preserved verbatim across sync except for
    /// per-key last-write-wins conflict resolution.
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last-modified timestamp; always `>= created_at`.
    pub updated_at: DateTime<Utc>,
    /// Fields written by a newer version of eluent that this version does
    /// not know about; carried through load/save/merge untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Atom {
    /// Construct a new, valid atom with sane defaults for every optional
    /// field, running the same validation and normalisation `update` does.
    ///
    /// # Errors
    /// Returns a [`ValidationError`] if `title` or any long-form field
    /// exceeds its length cap, or the resulting timestamps are inverted.
    pub fn new(
        id: AtomId,
        title: &str,
        issue_type: IssueType,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let mut atom = Self {
            id,
            title: String::new(),
            description: String::new(),
            design: String::new(),
            notes: String::new(),
            status: Status::Open,
            issue_type,
            priority: Priority::default(),
            labels: BTreeSet::new(),
            assignee: None,
            creator: None,
            parent_id: None,
            defer_until: None,
            due_at: None,
            closed_at: None,
            close_reason: None,
            metadata: BTreeMap::new(),
            created_at,
            updated_at: created_at,
            extra: BTreeMap::new(),
        };
        atom.set_title(title)?;
        Ok(atom)
    }

    /// Set the title, NFC-normalising and truncating to 500 chars with a
    /// `tracing` warning if it was too long (never an error, per §4.1).
    pub fn set_title(&mut self, title: &str) -> Result<(), ValidationError> {
        let normalized = normalize(title);
        let (truncated, was_truncated) = truncate_chars(&normalized, MAX_TITLE_CHARS);
        if was_truncated {
            tracing::warn!(atom_id = %self.id, "title exceeded 500 chars, truncated");
        }
        self.title = truncated;
        Ok(())
    }

    /// Set a long-form field (`description`, `design`, or `notes`),
    /// validating the 65536-char cap and NFC-normalising.
    ///
    /// # Errors
    /// Returns [`ErrorKind::ContentTooLong`]-esque error if `content`
    /// exceeds 65536 chars.
    pub fn validate_long_field(content: &str) -> Result<String, ValidationError> {
        let normalized = normalize(content);
        if normalized.chars().count() > MAX_CONTENT_CHARS {
            return Err(ValidationError {
                kind: ErrorKind::Content,
                value: format!("{} chars", normalized.chars().count()),
                reason: format!("content exceeds {MAX_CONTENT_CHARS} character limit"),
            });
        }
        Ok(normalized)
    }

    /// Validate every time-ordering and self-consistency invariant that
    /// does not require graph or repository context.
    ///
    /// # Errors
    /// Returns an error if `updated_at < created_at`.
    pub fn validate_times(&self) -> Result<(), ValidationError> {
        if self.updated_at < self.created_at {
            return Err(ValidationError {
                kind: ErrorKind::Time,
                value: self.updated_at.to_rfc3339(),
                reason: "updated_at must be >= created_at".to_owned(),
            });
        }
        Ok(())
    }

    /// Whether the close-reason text matches the conditional-blocks
    /// failure pattern `^(fail|error|abort)` (case-insensitive).
    #[must_use]
    pub fn close_reason_indicates_failure(&self) -> bool {
        self.close_reason.as_deref().is_some_and(|reason| {
            let lower = reason.to_ascii_lowercase();
            lower.starts_with("fail") || lower.starts_with("error") || lower.starts_with("abort")
        })
    }

    /// Whether this atom is past its deferral window (or has none).
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.defer_until.is_none_or(|t| t <= now)
    }

    /// `true` for `issue_type ∈ {epic, formula}`.
    #[must_use]
    pub const fn is_abstract(&self) -> bool {
        self.issue_type.is_abstract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::RepoName;

    fn sample_id() -> AtomId {
        AtomId::generate(RepoName::sanitize("proj").unwrap())
    }

    #[test]
    fn status_transitions_allow_reopen_from_anything_but_discard() {
        assert!(Status::Closed.can_transition_to(Status::Open));
        assert!(Status::Discard.can_transition_to(Status::Open));
    }

    #[test]
    fn discard_only_reachable_from_closed() {
        assert!(Status::Closed.can_transition_to(Status::Discard));
        assert!(!Status::Open.can_transition_to(Status::Discard));
        assert!(!Status::InProgress.can_transition_to(Status::Discard));
    }

    #[test]
    fn discard_is_terminal_and_cannot_transition_onward_except_to_open() {
        assert!(!Status::Discard.can_transition_to(Status::Closed));
        assert!(!Status::Discard.can_transition_to(Status::InProgress));
        assert!(Status::Discard.is_terminal());
    }

    #[test]
    fn closed_reachable_from_any_nonterminal_state() {
        for from in [Status::Open, Status::InProgress, Status::Deferred] {
            assert!(from.can_transition_to(Status::Closed));
        }
    }

    #[test]
    fn issue_type_abstractness() {
        assert!(IssueType::Epic.is_abstract());
        assert!(IssueType::Formula.is_abstract());
        assert!(!IssueType::Task.is_abstract());
    }

    #[test]
    fn priority_rejects_out_of_range() {
        assert!(Priority::new(4).is_ok());
        assert!(Priority::new(5).is_err());
    }

    #[test]
    fn atom_title_truncates_without_error() {
        let long_title = "x".repeat(600);
        let atom = Atom::new(sample_id(), &long_title, IssueType::Task, Utc::now()).unwrap();
        assert_eq!(atom.title.chars().count(), MAX_TITLE_CHARS);
    }

    #[test]
    fn long_field_rejects_over_limit() {
        let content = "x".repeat(MAX_CONTENT_CHARS + 1);
        assert!(Atom::validate_long_field(&content).is_err());
    }

    #[test]
    fn long_field_accepts_at_limit() {
        let content = "x".repeat(MAX_CONTENT_CHARS);
        assert!(Atom::validate_long_field(&content).is_ok());
    }

    #[test]
    fn validate_times_rejects_inverted_order() {
        let mut atom = Atom::new(sample_id(), "t", IssueType::Task, Utc::now()).unwrap();
        atom.updated_at = atom.created_at - chrono::Duration::seconds(1);
        assert!(atom.validate_times().is_err());
    }

    #[test]
    fn close_reason_failure_pattern_matches_expected_prefixes() {
        let mut atom = Atom::new(sample_id(), "t", IssueType::Task, Utc::now()).unwrap();
        for reason in ["failed: timeout", "ERROR: bad state", "Aborted by user"] {
            atom.close_reason = Some(reason.to_owned());
            assert!(atom.close_reason_indicates_failure(), "{reason} should match");
        }
        atom.close_reason = Some("success".to_owned());
        assert!(!atom.close_reason_indicates_failure());
    }

    #[test]
    fn title_is_nfc_normalized() {
        // "e\u{0301}" (e + combining acute) should normalize to "é" (single codepoint).
        let decomposed = "Cafe\u{0301}";
        let atom = Atom::new(sample_id(), decomposed, IssueType::Task, Utc::now()).unwrap();
        assert_eq!(atom.title.chars().count(), 4);
    }
}
