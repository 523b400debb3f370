//! Dependency-graph traversal, cycle detection, and the blocking resolver.

pub mod blocking;
pub mod cycle;

use std::collections::{HashSet, VecDeque};

use crate::index::Indexer;
use crate::model::types::AtomId;

/// Bonds whose `source_id == id`, optionally restricted to blocking types.
fn out_edges<'a>(index: &'a Indexer, id: &AtomId, blocking_only: bool) -> impl Iterator<Item = &'a AtomId> + 'a {
    index
        .bonds_from(id)
        .iter()
        .filter(move |b| !blocking_only || b.dependency_type.is_blocking())
        .map(|b| &b.target_id)
}

/// Bonds whose `target_id == id`, optionally restricted to blocking types.
fn in_edges<'a>(index: &'a Indexer, id: &AtomId, blocking_only: bool) -> impl Iterator<Item = &'a AtomId> + 'a {
    index
        .bonds_to(id)
        .iter()
        .filter(move |b| !blocking_only || b.dependency_type.is_blocking())
        .map(|b| &b.source_id)
}

/// Depth-first search: is `dst` reachable from `src` following out-edges?
#[must_use]
pub fn path_exists(index: &Indexer, src: &AtomId, dst: &AtomId, blocking_only: bool) -> bool {
    if src == dst {
        return true;
    }
    let mut seen = HashSet::new();
    let mut stack = vec![src.clone()];
    while let Some(current) = stack.pop() {
        if !seen.insert(current.clone()) {
            continue;
        }
        for next in out_edges(index, &current, blocking_only) {
            if next == dst {
                return true;
            }
            stack.push(next.clone());
        }
    }
    false
}

/// Breadth-first search over out-edges: every atom reachable from `id`
/// (exclusive of `id` itself).
#[must_use]
pub fn all_descendants(index: &Indexer, id: &AtomId, blocking_only: bool) -> Vec<AtomId> {
    bfs(index, id, blocking_only, true)
}

/// Breadth-first search over in-edges: every atom that can reach `id`
/// (exclusive of `id` itself).
#[must_use]
pub fn all_ancestors(index: &Indexer, id: &AtomId, blocking_only: bool) -> Vec<AtomId> {
    bfs(index, id, blocking_only, false)
}

fn bfs(index: &Indexer, id: &AtomId, blocking_only: bool, forward: bool) -> Vec<AtomId> {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(id.clone());
    queue.push_back(id.clone());
    let mut out = Vec::new();
    while let Some(current) = queue.pop_front() {
        let neighbors: Vec<AtomId> = if forward {
            out_edges(index, &current, blocking_only).cloned().collect()
        } else {
            in_edges(index, &current, blocking_only).cloned().collect()
        };
        for next in neighbors {
            if seen.insert(next.clone()) {
                out.push(next.clone());
                queue.push_back(next);
            }
        }
    }
    out
}

/// Atoms with a bond directly pointing *into* `id` (its immediate
/// blockers, regardless of type — callers filter by blocking status).
#[must_use]
pub fn direct_blockers(index: &Indexer, id: &AtomId) -> Vec<AtomId> {
    index.bonds_to(id).iter().map(|b| b.source_id.clone()).collect()
}

/// Atoms with a bond directly originating *from* `id`.
#[must_use]
pub fn direct_dependents(index: &Indexer, id: &AtomId) -> Vec<AtomId> {
    index.bonds_from(id).iter().map(|b| b.target_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Atom, Bond, DependencyType, IssueType};
    use crate::model::types::RepoName;
    use chrono::Utc;

    fn atom() -> Atom {
        let id = AtomId::generate(RepoName::sanitize("proj").unwrap());
        Atom::new(id, "t", IssueType::Task, Utc::now()).unwrap()
    }

    #[test]
    fn path_exists_follows_chain() {
        let a = atom();
        let b = atom();
        let c = atom();
        let bond1 = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let bond2 = Bond::new(b.id.clone(), c.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a.clone(), b.clone(), c.clone()], vec![bond1, bond2], vec![]);

        assert!(path_exists(&idx, &a.id, &c.id, true));
        assert!(!path_exists(&idx, &c.id, &a.id, true));
    }

    #[test]
    fn all_descendants_and_ancestors_are_symmetric() {
        let a = atom();
        let b = atom();
        let c = atom();
        let bond1 = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let bond2 = Bond::new(b.id.clone(), c.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a.clone(), b.clone(), c.clone()], vec![bond1, bond2], vec![]);

        let mut descendants = all_descendants(&idx, &a.id, true);
        descendants.sort_by_key(std::string::ToString::to_string);
        let mut expected = vec![b.id.clone(), c.id.clone()];
        expected.sort_by_key(std::string::ToString::to_string);
        assert_eq!(descendants, expected);

        assert_eq!(all_ancestors(&idx, &c.id, true), vec![b.id.clone(), a.id.clone()]);
    }

    #[test]
    fn direct_blockers_and_dependents() {
        let a = atom();
        let b = atom();
        let bond = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a.clone(), b.clone()], vec![bond], vec![]);

        assert_eq!(direct_blockers(&idx, &b.id), vec![a.id.clone()]);
        assert_eq!(direct_dependents(&idx, &a.id), vec![b.id.clone()]);
    }
}
