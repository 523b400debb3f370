//! A prefix trie over ULID randomness suffixes, one per repository, used to
//! resolve short IDs and compute minimum-unique prefixes.

use std::collections::BTreeMap;

use crate::model::types::AtomId;

/// Map confusable characters the way a human typing a short ID by hand
/// might: uppercase, then `I→1`, `L→1`, `O→0`. Applied identically at
/// insert and query time so a confusable typo still resolves.
#[must_use]
pub fn normalize_confusable(s: &str) -> String {
    s.chars()
        .map(|c| match c.to_ascii_uppercase() {
            'I' | 'L' => '1',
            'O' => '0',
            other => other,
        })
        .collect()
}

#[derive(Debug, Default)]
struct Node {
    children: BTreeMap<char, Node>,
    atom: Option<AtomId>,
}

impl Node {
    fn collect(&self, out: &mut Vec<AtomId>) {
        if let Some(atom) = &self.atom {
            out.push(atom.clone());
        }
        for child in self.children.values() {
            child.collect(out);
        }
    }
}

/// A prefix trie keyed on the (confusable-normalised) 16-character
/// randomness suffix of an atom's ULID.
#[derive(Debug, Default)]
pub struct PrefixTrie {
    root: Node,
    len: usize,
}

/// Shortest prefix length the resolver will accept for a short-ID lookup.
pub const MIN_PREFIX_LEN: usize = 4;

impl PrefixTrie {
    /// Create an empty trie.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of atoms currently indexed.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the trie is empty.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Insert an atom keyed by its randomness suffix.
    pub fn insert(&mut self, suffix: &str, atom: AtomId) {
        let key = normalize_confusable(suffix);
        let mut node = &mut self.root;
        for ch in key.chars() {
            node = node.children.entry(ch).or_default();
        }
        if node.atom.is_none() {
            self.len += 1;
        }
        node.atom = Some(atom);
    }

    /// Remove the atom keyed by this randomness suffix, if present.
    pub fn delete(&mut self, suffix: &str) {
        let key = normalize_confusable(suffix);
        if Self::delete_rec(&mut self.root, &key) {
            self.len = self.len.saturating_sub(1);
        }
    }

    fn delete_rec(node: &mut Node, key: &str) -> bool {
        let Some(ch) = key.chars().next() else {
            let had = node.atom.is_some();
            node.atom = None;
            return had;
        };
        let rest = &key[ch.len_utf8()..];
        let Some(child) = node.children.get_mut(&ch) else {
            return false;
        };
        let removed = Self::delete_rec(child, rest);
        if child.children.is_empty() && child.atom.is_none() {
            node.children.remove(&ch);
        }
        removed
    }

    /// Every atom whose (normalised) suffix starts with `prefix`.
    #[must_use]
    pub fn prefix_match(&self, prefix: &str) -> Vec<AtomId> {
        let key = normalize_confusable(prefix);
        let mut node = &self.root;
        for ch in key.chars() {
            match node.children.get(&ch) {
                Some(next) => node = next,
                None => return Vec::new(),
            }
        }
        let mut out = Vec::new();
        node.collect(&mut out);
        out
    }

    /// The smallest `k >= MIN_PREFIX_LEN` such that `suffix[..k]` matches
    /// exactly one atom in the trie, or `None` if even the full suffix is
    /// ambiguous (two atoms collided on their full randomness, which the
    /// repository layer should have prevented by regenerating on insert).
    #[must_use]
    pub fn minimum_unique_prefix(&self, suffix: &str) -> Option<String> {
        let key = normalize_confusable(suffix);
        let chars: Vec<char> = key.chars().collect();
        for k in MIN_PREFIX_LEN..=chars.len() {
            let candidate: String = chars[..k].iter().collect();
            if self.prefix_match(&candidate).len() == 1 {
                return Some(candidate);
            }
        }
        None
    }
}
