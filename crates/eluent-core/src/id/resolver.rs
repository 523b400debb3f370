//! Short-ID resolution: turn a full ID or a randomness-prefix typed by a
//! human or agent into exactly one atom.

use crate::id::trie::{normalize_confusable, MIN_PREFIX_LEN};
use crate::index::Indexer;
use crate::model::types::{AtomId, RepoName};

/// The outcome of a failed resolution.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    /// The input looked like a relative reference (`.foo`), which only the
    /// caller's current-item context can resolve.
    #[error("relative reference '.{suffix}' requires a current-item context")]
    RelativeReference {
        /// The text following the leading `.`.
        suffix: String,
    },
    /// Nothing matched.
    #[error("no atom found matching '{input}'")]
    NotFound {
        /// The input that was looked up.
        input: String,
    },
    /// More than one atom matched.
    #[error("prefix '{prefix}' matches multiple atoms: {candidates:?}")]
    Ambiguous {
        /// The prefix that was looked up.
        prefix: String,
        /// Every atom ID it matched.
        candidates: Vec<AtomId>,
    },
}

/// Resolve `input` against `index`, optionally scoped to `current_repo`
/// when the input is a bare prefix rather than `<repo>-<prefix>`.
///
/// Steps (§4.2):
/// 1. Normalise (uppercase, confusable mapping) for prefix comparison.
/// 2. A leading `.` is a relative reference, not resolvable here.
/// 3. A full `<repo>-<ulid>` parses directly; look it up by exact ID.
/// 4. A `<repo>-<prefix>` scopes the trie search to that repo.
/// 5. Otherwise search the trie of `current_repo`.
/// 6. Zero/one/many matches become `NotFound`/`Ok`/`Ambiguous`.
///
/// # Errors
/// See [`ResolveError`].
pub fn resolve(
    input: &str,
    current_repo: Option<&RepoName>,
    index: &Indexer,
) -> Result<AtomId, ResolveError> {
    if let Some(suffix) = input.strip_prefix('.') {
        return Err(ResolveError::RelativeReference {
            suffix: suffix.to_owned(),
        });
    }

    if let Ok(id) = AtomId::parse(input) {
        if index.find_by_id(&id).is_some() {
            return Ok(id);
        }
    }

    let (repo, prefix) = split_scoped_prefix(input, current_repo);

    let candidates = index.find_by_prefix(repo.as_ref(), &prefix);
    match candidates.len() {
        0 => Err(ResolveError::NotFound {
            input: input.to_owned(),
        }),
        1 => Ok(candidates.into_iter().next().expect("len checked")),
        _ => Err(ResolveError::Ambiguous {
            prefix: normalize_confusable(&prefix),
            candidates,
        }),
    }
}

/// Split `input` into an optional repo scope and the randomness prefix to
/// search for. `<repo>-<prefix>` scopes to `repo`; a bare prefix falls
/// back to `current_repo`.
fn split_scoped_prefix(input: &str, current_repo: Option<&RepoName>) -> (Option<RepoName>, String) {
    if let Some(idx) = input.rfind('-') {
        let (head, tail) = (&input[..idx], &input[idx + 1..]);
        if let Ok(repo) = RepoName::from_config(head).or_else(|_| RepoName::sanitize(head)) {
            if tail.len() >= MIN_PREFIX_LEN {
                return (Some(repo), tail.to_owned());
            }
        }
    }
    (current_repo.cloned(), input.to_owned())
}
