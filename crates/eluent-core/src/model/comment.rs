//! The comment: an append-only discussion node attached to an atom.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use super::types::{AtomId, CommentId, ErrorKind, ValidationError};

const MAX_CONTENT_CHARS: usize = 65_536;

/// An append-only discussion node. Content is never edited in place at the
/// protocol level — `updated_at` tracks metadata changes made by sync
/// (e.g. digest recomputation), not content edits.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Unique identifier, `<atom_id>-c<n>`.
    pub id: CommentId,
    /// The atom this comment is attached to.
    pub parent_id: AtomId,
    /// Who wrote the comment.
    pub author: String,
    /// Comment text, ≤ 65536 chars, NFC-normalised.
    pub content: String,
    /// When the comment was written.
    pub created_at: DateTime<Utc>,
    /// Last touched (by sync bookkeeping only).
    pub updated_at: DateTime<Utc>,
    /// Fields written by a newer version of eluent; carried through
    /// untouched.
    #[serde(flatten)]
    pub extra: std::collections::BTreeMap<String, serde_json::Value>,
}

impl Comment {
    /// Construct a new comment, validating and NFC-normalising `content`.
    ///
    /// # Errors
    /// Returns [`ErrorKind::Content`] if `content` exceeds 65536 chars.
    pub fn new(
        id: CommentId,
        parent_id: AtomId,
        author: impl Into<String>,
        content: &str,
        created_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        let normalized: String = content.chars().nfc().collect();
        if normalized.chars().count() > MAX_CONTENT_CHARS {
            return Err(ValidationError {
                kind: ErrorKind::Content,
                value: format!("{} chars", normalized.chars().count()),
                reason: format!("content exceeds {MAX_CONTENT_CHARS} character limit"),
            });
        }
        Ok(Self {
            id,
            parent_id,
            author: author.into(),
            content: normalized,
            created_at,
            updated_at: created_at,
            extra: std::collections::BTreeMap::new(),
        })
    }

    /// The 16-hex-char digest of `(parent_id, author, created_at, content)`
    /// used as the sync-time deduplication identity.
    #[must_use]
    pub fn content_digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.parent_id.to_string().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.author.as_bytes());
        hasher.update(b"\0");
        hasher.update(self.created_at.to_rfc3339().as_bytes());
        hasher.update(b"\0");
        hasher.update(self.content.as_bytes());
        let digest = hasher.finalize();
        digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::RepoName;

    fn parent() -> AtomId {
        AtomId::generate(RepoName::sanitize("proj").unwrap())
    }

    #[test]
    fn content_digest_is_sixteen_hex_chars() {
        let p = parent();
        let c = Comment::new(CommentId::new(p.clone(), 1), p, "alice", "hello", Utc::now()).unwrap();
        let digest = c.content_digest();
        assert_eq!(digest.len(), 16);
        assert!(digest.chars().all(|ch| ch.is_ascii_hexdigit()));
    }

    #[test]
    fn content_digest_is_stable_for_identical_inputs() {
        let p = parent();
        let ts = Utc::now();
        let a = Comment::new(CommentId::new(p.clone(), 1), p.clone(), "alice", "hi", ts).unwrap();
        let b = Comment::new(CommentId::new(p.clone(), 2), p, "alice", "hi", ts).unwrap();
        assert_eq!(a.content_digest(), b.content_digest());
    }

    #[test]
    fn content_digest_differs_on_content_change() {
        let p = parent();
        let ts = Utc::now();
        let a = Comment::new(CommentId::new(p.clone(), 1), p.clone(), "alice", "hi", ts).unwrap();
        let b = Comment::new(CommentId::new(p.clone(), 1), p, "alice", "bye", ts).unwrap();
        assert_ne!(a.content_digest(), b.content_digest());
    }

    #[test]
    fn rejects_content_over_limit() {
        let p = parent();
        let content = "x".repeat(MAX_CONTENT_CHARS + 1);
        assert!(Comment::new(CommentId::new(p.clone(), 1), p, "a", &content, Utc::now()).is_err());
    }
}
