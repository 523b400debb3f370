//! Foundation types: repository names, ULIDs, and the structured atom/comment
//! identifiers built from them.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// ValidationError
// ---------------------------------------------------------------------------

/// What kind of value failed validation — lets callers match on the field
/// without parsing the message.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A repository name.
    RepoName,
    /// A ULID string.
    Ulid,
    /// A structured atom identifier.
    AtomId,
    /// An atom title.
    Title,
    /// An atom description/design/notes body, or a comment body.
    Content,
    /// An atom status.
    Status,
    /// An atom issue type.
    IssueType,
    /// An atom priority.
    Priority,
    /// A bond's dependency type.
    DependencyType,
    /// A bond whose source and target are the same atom.
    SelfReference,
    /// A timestamp ordering violation (`updated_at < created_at`).
    Time,
}

/// A validation failure: what was wrong, with the offending value and a
/// human-readable reason.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationError {
    /// Which kind of value failed.
    pub kind: ErrorKind,
    /// The value that failed (stringified).
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {:?} {:?}: {}", self.kind, self.value, self.reason)
    }
}

impl std::error::Error for ValidationError {}

// ---------------------------------------------------------------------------
// RepoName
// ---------------------------------------------------------------------------

/// A validated, sanitised repository name. Used as the ID prefix for every
/// atom created in the repository.
///
/// Sanitisation (§6): strips leading/trailing dots, replaces
/// `/ \ : * ? " < > |` with `_`, collapses runs of two or more dots to `_`,
/// truncates to 200 bytes, and rejects the empty result.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoName(String);

impl RepoName {
    /// Sanitise and validate a raw name (e.g. a directory name or a git
    /// remote's repository segment).
    ///
    /// # Errors
    /// Returns an error if the sanitised result is empty.
    pub fn sanitize(raw: &str) -> Result<Self, ValidationError> {
        let trimmed = raw.trim_matches('.');
        let mut out = String::with_capacity(trimmed.len());
        let mut dot_run = 0usize;
        for ch in trimmed.chars() {
            let mapped = match ch {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
                other => other,
            };
            if mapped == '.' {
                dot_run += 1;
                if dot_run >= 2 {
                    if out.ends_with('_') {
                        continue;
                    }
                    out.push('_');
                    continue;
                }
            } else {
                dot_run = 0;
            }
            out.push(mapped);
        }
        let mut bytes: Vec<u8> = out.into_bytes();
        if bytes.len() > 200 {
            bytes.truncate(200);
            while !bytes.is_empty() && !std::str::from_utf8(&bytes).is_ok() {
                bytes.pop();
            }
        }
        let out = String::from_utf8(bytes).unwrap_or_default();
        if out.is_empty() {
            return Err(ValidationError {
                kind: ErrorKind::RepoName,
                value: raw.to_owned(),
                reason: "sanitised name is empty".to_owned(),
            });
        }
        Ok(Self(out))
    }

    /// Validate an already-sanitised, already-lowercase repo name against
    /// the stricter config pattern `^[a-z][a-z0-9_-]{0,31}$` used when a
    /// name is read back from `config.yaml` rather than inferred.
    ///
    /// # Errors
    /// Returns an error if the pattern does not match.
    pub fn from_config(raw: &str) -> Result<Self, ValidationError> {
        let ok = raw.len() <= 32
            && raw
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_lowercase())
            && raw
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
        if ok {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ValidationError {
                kind: ErrorKind::RepoName,
                value: raw.to_owned(),
                reason: "must match ^[a-z][a-z0-9_-]{0,31}$".to_owned(),
            })
        }
    }

    /// The underlying string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RepoName {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::sanitize(&s)
    }
}

impl From<RepoName> for String {
    fn from(name: RepoName) -> Self {
        name.0
    }
}

// ---------------------------------------------------------------------------
// Crockford Base32 (shared by Ulid encode/decode)
// ---------------------------------------------------------------------------

const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

fn decode_char(c: u8) -> Option<u8> {
    // Confusable normalisation happens one layer up, in the ID resolver —
    // this table only accepts the canonical alphabet.
    let upper = c.to_ascii_uppercase();
    ALPHABET.iter().position(|&a| a == upper).map(|p| p as u8)
}

// ---------------------------------------------------------------------------
// Ulid
// ---------------------------------------------------------------------------

/// A 128-bit ULID: a 48-bit millisecond timestamp followed by 80 bits of
/// randomness, encoded as 26 Crockford-Base32 characters.
///
/// The first character is restricted to `0..7` — the timestamp only needs
/// 48 of the 50 bits the first 10 characters could hold, so the two high
/// bits are always zero, which bounds the first character's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ulid {
    timestamp_ms: u64,
    randomness: u128,
}

const RANDOMNESS_MASK: u128 = (1u128 << 80) - 1;

impl Ulid {
    /// Construct a ULID from an explicit timestamp and randomness value
    /// (only the low 80 bits of `randomness` are used). Mainly for tests;
    /// [`Ulid::generate`] is the normal constructor.
    ///
    /// # Errors
    /// Returns an error if `timestamp_ms` does not fit in 48 bits.
    pub fn from_parts(timestamp_ms: u64, randomness: u128) -> Result<Self, ValidationError> {
        if timestamp_ms >= (1u64 << 48) {
            return Err(ValidationError {
                kind: ErrorKind::Ulid,
                value: timestamp_ms.to_string(),
                reason: "timestamp does not fit in 48 bits".to_owned(),
            });
        }
        Ok(Self {
            timestamp_ms,
            randomness: randomness & RANDOMNESS_MASK,
        })
    }

    /// Generate a new ULID for the current wall-clock time with
    /// cryptographically-insignificant but well-distributed randomness.
    #[must_use]
    pub fn generate() -> Self {
        let now_ms = u64::try_from(chrono::Utc::now().timestamp_millis().max(0))
            .unwrap_or(0)
            & ((1u64 << 48) - 1);
        let randomness: u128 = rand::random::<u128>() & RANDOMNESS_MASK;
        Self {
            timestamp_ms: now_ms,
            randomness,
        }
    }

    /// Milliseconds since the Unix epoch encoded in this ULID.
    #[must_use]
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    fn as_u128(self) -> u128 {
        (u128::from(self.timestamp_ms) << 80) | self.randomness
    }

    /// Encode as the canonical 26-character Crockford-Base32 string.
    #[must_use]
    pub fn encode(self) -> String {
        let value = self.as_u128();
        let mut out = String::with_capacity(26);
        // The first character carries only the top 3 bits (the timestamp's
        // two unused high bits make it a 5-bit group everywhere else).
        let first = (value >> 125) & 0x7;
        out.push(ALPHABET[first as usize] as char);
        for i in 0..25u32 {
            let shift = 120 - 5 * i;
            let idx = (value >> shift) & 0x1F;
            out.push(ALPHABET[idx as usize] as char);
        }
        out
    }

    /// The last 16 characters of the encoded ULID — the randomness suffix
    /// the ID resolver and prefix trie index on.
    #[must_use]
    pub fn randomness_suffix(self) -> String {
        let encoded = self.encode();
        encoded[10..].to_owned()
    }

    /// Parse a 26-character Crockford-Base32 ULID string.
    ///
    /// # Errors
    /// Returns an error if the length is wrong, a character is outside the
    /// Crockford alphabet, or the first character's value exceeds 7
    /// (would overflow the 48-bit timestamp).
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let bytes = s.as_bytes();
        if bytes.len() != 26 {
            return Err(ValidationError {
                kind: ErrorKind::Ulid,
                value: s.to_owned(),
                reason: format!("expected 26 characters, got {}", bytes.len()),
            });
        }
        let first = decode_char(bytes[0]).ok_or_else(|| ValidationError {
            kind: ErrorKind::Ulid,
            value: s.to_owned(),
            reason: format!("invalid character {:?}", bytes[0] as char),
        })?;
        if first > 7 {
            return Err(ValidationError {
                kind: ErrorKind::Ulid,
                value: s.to_owned(),
                reason: "first character must be in 0..7 (timestamp overflow)".to_owned(),
            });
        }
        let mut value: u128 = u128::from(first);
        for &b in &bytes[1..] {
            let v = decode_char(b).ok_or_else(|| ValidationError {
                kind: ErrorKind::Ulid,
                value: s.to_owned(),
                reason: format!("invalid character {:?}", b as char),
            })?;
            value = (value << 5) | u128::from(v);
        }
        let timestamp_ms = (value >> 80) as u64;
        let randomness = value & RANDOMNESS_MASK;
        Ok(Self {
            timestamp_ms,
            randomness,
        })
    }
}

impl fmt::Display for Ulid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl FromStr for Ulid {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Ulid {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Ulid {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// AtomId
// ---------------------------------------------------------------------------

/// A structured atom identifier: `<repo_name>-<ulid>[.<child>[.<grandchild>]…]`.
///
/// The optional dotted suffix names a sub-atom spawned from a parent (e.g.
/// a formula instantiation numbering its generated children) without
/// minting an unrelated ULID for it; identity for trie/exact lookups is
/// still keyed on the base `(repo, ulid)` pair plus this path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AtomId {
    repo: RepoName,
    ulid: Ulid,
    path: Vec<u32>,
}

impl AtomId {
    /// Mint a fresh top-level atom ID in `repo`.
    #[must_use]
    pub fn generate(repo: RepoName) -> Self {
        Self {
            repo,
            ulid: Ulid::generate(),
            path: Vec::new(),
        }
    }

    /// Build an atom ID from explicit parts (used by the repository when
    /// re-rolling a colliding ID).
    #[must_use]
    pub const fn from_ulid(repo: RepoName, ulid: Ulid) -> Self {
        Self {
            repo,
            ulid,
            path: Vec::new(),
        }
    }

    /// The `n`th child of this atom, e.g. for formula-generated sub-items.
    #[must_use]
    pub fn child(&self, n: u32) -> Self {
        let mut path = self.path.clone();
        path.push(n);
        Self {
            repo: self.repo.clone(),
            ulid: self.ulid,
            path,
        }
    }

    /// The repository this atom belongs to.
    #[must_use]
    pub const fn repo(&self) -> &RepoName {
        &self.repo
    }

    /// The ULID portion (shared by an atom and all of its dotted children).
    #[must_use]
    pub const fn ulid(&self) -> Ulid {
        self.ulid
    }

    /// The 16-character randomness suffix used for short-ID resolution.
    #[must_use]
    pub fn randomness_suffix(&self) -> String {
        self.ulid.randomness_suffix()
    }

    /// Parse a full atom ID string of the form `<repo>-<ulid>[.<n>]*`.
    ///
    /// # Errors
    /// Returns an error if the string does not contain a `-` separating a
    /// valid repo name from a valid ULID, or if a dotted path segment is
    /// not a valid non-negative integer.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let (head, path_str) = match s.find('.') {
            Some(idx) => (&s[..idx], Some(&s[idx + 1..])),
            None => (s, None),
        };
        let sep = head.rfind('-').ok_or_else(|| ValidationError {
            kind: ErrorKind::AtomId,
            value: s.to_owned(),
            reason: "expected '<repo>-<ulid>'".to_owned(),
        })?;
        let repo = RepoName::from_config(&head[..sep]).or_else(|_| RepoName::sanitize(&head[..sep]))?;
        let ulid = Ulid::parse(&head[sep + 1..])?;
        let mut path = Vec::new();
        if let Some(rest) = path_str {
            for seg in rest.split('.') {
                let n: u32 = seg.parse().map_err(|_| ValidationError {
                    kind: ErrorKind::AtomId,
                    value: s.to_owned(),
                    reason: format!("invalid child path segment {seg:?}"),
                })?;
                path.push(n);
            }
        }
        Ok(Self { repo, ulid, path })
    }
}

impl fmt::Display for AtomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.repo, self.ulid)?;
        for n in &self.path {
            write!(f, ".{n}")?;
        }
        Ok(())
    }
}

impl FromStr for AtomId {
    type Err = ValidationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for AtomId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<AtomId> for String {
    fn from(id: AtomId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// CommentId
// ---------------------------------------------------------------------------

/// A comment identifier: `<atom_id>-c<n>`, `n` being the comment's 1-based
/// sequence number on its parent atom.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CommentId {
    atom_id: AtomId,
    sequence: u32,
}

impl CommentId {
    /// Build a comment ID from its parent atom and sequence number.
    #[must_use]
    pub const fn new(atom_id: AtomId, sequence: u32) -> Self {
        Self { atom_id, sequence }
    }

    /// The parent atom this comment belongs to.
    #[must_use]
    pub const fn atom_id(&self) -> &AtomId {
        &self.atom_id
    }

    /// The 1-based sequence number within the parent atom's comments.
    #[must_use]
    pub const fn sequence(&self) -> u32 {
        self.sequence
    }

    /// Parse `<atom_id>-c<n>`.
    ///
    /// # Errors
    /// Returns an error if the string does not end in `-c<digits>` or the
    /// atom-id prefix does not parse.
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        let idx = s.rfind("-c").ok_or_else(|| ValidationError {
            kind: ErrorKind::AtomId,
            value: s.to_owned(),
            reason: "expected '<atom_id>-c<n>'".to_owned(),
        })?;
        let sequence: u32 = s[idx + 2..].parse().map_err(|_| ValidationError {
            kind: ErrorKind::AtomId,
            value: s.to_owned(),
            reason: "comment sequence must be a non-negative integer".to_owned(),
        })?;
        let atom_id = AtomId::parse(&s[..idx])?;
        Ok(Self { atom_id, sequence })
    }
}

impl fmt::Display for CommentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-c{}", self.atom_id, self.sequence)
    }
}

impl TryFrom<String> for CommentId {
    type Error = ValidationError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<CommentId> for String {
    fn from(id: CommentId) -> Self {
        id.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_name_sanitizes_forbidden_characters() {
        let name = RepoName::sanitize("my/repo:name*?").unwrap();
        assert_eq!(name.as_str(), "my_repo_name__");
    }

    #[test]
    fn repo_name_strips_leading_trailing_dots() {
        let name = RepoName::sanitize("..hidden..").unwrap();
        assert_eq!(name.as_str(), "hidden");
    }

    #[test]
    fn repo_name_rejects_empty_result() {
        assert!(RepoName::sanitize("...").is_err());
        assert!(RepoName::sanitize("").is_err());
    }

    #[test]
    fn repo_name_collapses_dot_runs() {
        let name = RepoName::sanitize("a..b...c").unwrap();
        assert_eq!(name.as_str(), "a_b_c");
    }

    #[test]
    fn ulid_round_trips_through_string() {
        let ulid = Ulid::from_parts(1_700_000_000_000, 0xABCDEF_0123_4567_89AB).unwrap();
        let s = ulid.encode();
        assert_eq!(s.len(), 26);
        let parsed = Ulid::parse(&s).unwrap();
        assert_eq!(ulid, parsed);
    }

    #[test]
    fn ulid_first_char_is_bounded() {
        for _ in 0..50 {
            let ulid = Ulid::generate();
            let c = ulid.encode().chars().next().unwrap();
            assert!(('0'..='7').contains(&c), "first char {c} out of range");
        }
    }

    #[test]
    fn ulid_rejects_overflowing_first_character() {
        // 'Z' decodes to 31, far above the 0..7 ceiling.
        let bogus = format!("Z{}", "0".repeat(25));
        assert!(Ulid::parse(&bogus).is_err());
    }

    #[test]
    fn ulid_rejects_wrong_length() {
        assert!(Ulid::parse("ABC").is_err());
    }

    #[test]
    fn randomness_suffix_is_last_sixteen_chars() {
        let ulid = Ulid::from_parts(42, 1234).unwrap();
        let encoded = ulid.encode();
        assert_eq!(ulid.randomness_suffix(), encoded[10..]);
        assert_eq!(ulid.randomness_suffix().len(), 16);
    }

    #[test]
    fn atom_id_round_trips() {
        let repo = RepoName::sanitize("proj").unwrap();
        let id = AtomId::generate(repo);
        let s = id.to_string();
        let parsed = AtomId::parse(&s).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn atom_id_child_path_round_trips() {
        let repo = RepoName::sanitize("proj").unwrap();
        let id = AtomId::generate(repo);
        let child = id.child(1).child(2);
        let s = child.to_string();
        assert!(s.ends_with(".1.2"));
        let parsed = AtomId::parse(&s).unwrap();
        assert_eq!(parsed, child);
    }

    #[test]
    fn comment_id_round_trips() {
        let repo = RepoName::sanitize("proj").unwrap();
        let atom = AtomId::generate(repo);
        let comment = CommentId::new(atom.clone(), 3);
        let s = comment.to_string();
        let parsed = CommentId::parse(&s).unwrap();
        assert_eq!(parsed.atom_id(), &atom);
        assert_eq!(parsed.sequence, 3);
    }
}
