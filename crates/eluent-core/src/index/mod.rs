//! The in-memory indexer: derived state rebuilt from the on-disk JSONL on
//! every load. The file is the authority; everything here is a cache.

use std::collections::BTreeMap;

use crate::id::trie::PrefixTrie;
use crate::model::{Atom, Bond, Comment, DependencyType};
use crate::model::types::{AtomId, CommentId, RepoName};

/// Exact map, per-repo prefix tries, and adjacency lists derived from the
/// atoms/bonds/comments currently loaded.
#[derive(Debug, Default)]
pub struct Indexer {
    atoms: BTreeMap<AtomId, Atom>,
    tries: BTreeMap<RepoName, PrefixTrie>,
    bonds_from: BTreeMap<AtomId, Vec<Bond>>,
    bonds_to: BTreeMap<AtomId, Vec<Bond>>,
    children: BTreeMap<AtomId, Vec<AtomId>>,
    comments: BTreeMap<AtomId, Vec<Comment>>,
}

impl Indexer {
    /// An empty indexer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all derived state and rebuild from scratch.
    pub fn rebuild(&mut self, atoms: Vec<Atom>, bonds: Vec<Bond>, comments: Vec<Comment>) {
        self.atoms.clear();
        self.tries.clear();
        self.bonds_from.clear();
        self.bonds_to.clear();
        self.children.clear();
        self.comments.clear();

        for atom in atoms {
            self.index_atom(atom);
        }
        for bond in bonds {
            self.index_bond(bond);
        }
        for comment in comments {
            self.index_comment(comment);
        }
        for comment_list in self.comments.values_mut() {
            comment_list.sort_by_key(|c| c.created_at);
        }
    }

    /// Add or replace one atom in every index that keys on it.
    pub fn index_atom(&mut self, atom: Atom) {
        let trie = self.tries.entry(atom.id.repo().clone()).or_default();
        trie.insert(&atom.id.randomness_suffix(), atom.id.clone());

        let previous_parent = self.atoms.get(&atom.id).and_then(|old| old.parent_id.clone());
        if previous_parent != atom.parent_id {
            if let Some(old_parent) = &previous_parent {
                if let Some(siblings) = self.children.get_mut(old_parent) {
                    siblings.retain(|c| c != &atom.id);
                }
            }
        }
        if let Some(parent) = &atom.parent_id {
            let siblings = self.children.entry(parent.clone()).or_default();
            if !siblings.contains(&atom.id) {
                siblings.push(atom.id.clone());
            }
        }
        self.atoms.insert(atom.id.clone(), atom);
    }

    /// Add a bond to the source/target adjacency lists.
    pub fn index_bond(&mut self, bond: Bond) {
        self.bonds_from
            .entry(bond.source_id.clone())
            .or_default()
            .push(bond.clone());
        self.bonds_to.entry(bond.target_id.clone()).or_default().push(bond);
    }

    /// Add a comment under its parent atom.
    pub fn index_comment(&mut self, comment: Comment) {
        self.comments.entry(comment.parent_id.clone()).or_default().push(comment);
    }

    /// Look up an atom by its full ID.
    #[must_use]
    pub fn find_by_id(&self, id: &AtomId) -> Option<&Atom> {
        self.atoms.get(id)
    }

    /// Every atom whose randomness suffix starts with `prefix`, optionally
    /// scoped to a single repository's trie.
    #[must_use]
    pub fn find_by_prefix(&self, repo: Option<&RepoName>, prefix: &str) -> Vec<AtomId> {
        match repo {
            Some(repo) => self
                .tries
                .get(repo)
                .map(|t| t.prefix_match(prefix))
                .unwrap_or_default(),
            None => self.tries.values().flat_map(|t| t.prefix_match(prefix)).collect(),
        }
    }

    /// The minimum-unique prefix (≥ 4 chars) for `id` within its repo's
    /// trie.
    #[must_use]
    pub fn minimum_unique_prefix(&self, id: &AtomId) -> Option<String> {
        self.tries
            .get(id.repo())
            .and_then(|t| t.minimum_unique_prefix(&id.randomness_suffix()))
    }

    /// Direct children of `parent` in the atom tree.
    #[must_use]
    pub fn children_of(&self, parent: &AtomId) -> &[AtomId] {
        self.children.get(parent).map_or(&[], Vec::as_slice)
    }

    /// Bonds whose source is `id`.
    #[must_use]
    pub fn bonds_from(&self, id: &AtomId) -> &[Bond] {
        self.bonds_from.get(id).map_or(&[], Vec::as_slice)
    }

    /// Bonds whose target is `id`.
    #[must_use]
    pub fn bonds_to(&self, id: &AtomId) -> &[Bond] {
        self.bonds_to.get(id).map_or(&[], Vec::as_slice)
    }

    /// Comments attached to `id`, sorted by `created_at`.
    #[must_use]
    pub fn comments_for(&self, id: &AtomId) -> &[Comment] {
        self.comments.get(id).map_or(&[], Vec::as_slice)
    }

    /// Every atom currently indexed.
    #[must_use]
    pub fn all_atoms(&self) -> impl Iterator<Item = &Atom> {
        self.atoms.values()
    }

    /// Every bond currently indexed (iterates `bonds_from`, so each bond
    /// appears exactly once).
    #[must_use]
    pub fn all_bonds(&self) -> impl Iterator<Item = &Bond> {
        self.bonds_from.values().flatten()
    }

    /// Every comment currently indexed.
    #[must_use]
    pub fn all_comments(&self) -> impl Iterator<Item = &Comment> {
        self.comments.values().flatten()
    }

    /// Bonds of a specific blocking-relevant type pointing at `id`.
    #[must_use]
    pub fn bonds_to_of_type(&self, id: &AtomId, ty: DependencyType) -> Vec<&Bond> {
        self.bonds_to(id).iter().filter(|b| b.dependency_type == ty).collect()
    }

    /// Whether any atom currently has this comment's ID (used by the
    /// repository when minting sequence numbers).
    #[must_use]
    pub fn has_comment(&self, id: &CommentId) -> bool {
        self.comments_for(id.atom_id()).iter().any(|c| &c.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::RepoName;
    use crate::model::IssueType;
    use chrono::Utc;

    fn atom(repo: &str, title: &str) -> Atom {
        let id = AtomId::generate(RepoName::sanitize(repo).unwrap());
        Atom::new(id, title, IssueType::Task, Utc::now()).unwrap()
    }

    #[test]
    fn rebuild_indexes_atoms_bonds_and_comments() {
        let mut idx = Indexer::new();
        let a = atom("proj", "a");
        let b = atom("proj", "b");
        let bond = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let comment = Comment::new(
            CommentId::new(a.id.clone(), 1),
            a.id.clone(),
            "alice",
            "hi",
            Utc::now(),
        )
        .unwrap();

        idx.rebuild(vec![a.clone(), b.clone()], vec![bond.clone()], vec![comment.clone()]);

        assert_eq!(idx.find_by_id(&a.id), Some(&a));
        assert_eq!(idx.bonds_from(&a.id), &[bond]);
        assert_eq!(idx.comments_for(&a.id).len(), 1);
        assert_eq!(idx.all_atoms().count(), 2);
    }

    #[test]
    fn children_of_tracks_parent_id() {
        let mut idx = Indexer::new();
        let parent = atom("proj", "parent");
        let mut child = atom("proj", "child");
        child.parent_id = Some(parent.id.clone());
        idx.rebuild(vec![parent.clone(), child.clone()], vec![], vec![]);
        assert_eq!(idx.children_of(&parent.id), &[child.id]);
    }

    #[test]
    fn reindexing_an_atom_under_a_new_parent_drops_it_from_the_old_parents_children() {
        let mut idx = Indexer::new();
        let old_parent = atom("proj", "old-parent");
        let new_parent = atom("proj", "new-parent");
        let mut child = atom("proj", "child");
        child.parent_id = Some(old_parent.id.clone());
        idx.rebuild(vec![old_parent.clone(), new_parent.clone(), child.clone()], vec![], vec![]);
        assert_eq!(idx.children_of(&old_parent.id), &[child.id.clone()]);

        child.parent_id = Some(new_parent.id.clone());
        idx.index_atom(child.clone());

        assert_eq!(idx.children_of(&old_parent.id), &[] as &[AtomId]);
        assert_eq!(idx.children_of(&new_parent.id), &[child.id]);
    }

    #[test]
    fn find_by_prefix_scoped_to_repo() {
        let mut idx = Indexer::new();
        let a = atom("repoa", "a");
        idx.rebuild(vec![a.clone()], vec![], vec![]);
        let suffix = a.id.randomness_suffix();
        let found = idx.find_by_prefix(Some(a.id.repo()), &suffix[..4]);
        assert_eq!(found, vec![a.id.clone()]);
        let wrong_repo = RepoName::sanitize("repob").unwrap();
        assert!(idx.find_by_prefix(Some(&wrong_repo), &suffix[..4]).is_empty());
    }

}
