//! The blocking resolver: per-bond-type readiness rules with per-request
//! memoisation, per §4.5's table.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::index::Indexer;
use crate::model::types::AtomId;
use crate::model::{DependencyType, Status};

use super::all_descendants;

/// One reason an atom is blocked: the upstream atom and the dependency
/// type responsible (a synthetic `ParentChild` entry is surfaced when the
/// block comes from `parent_id` rather than an explicit bond).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blocker {
    /// The blocking atom.
    pub source_id: AtomId,
    /// Why it blocks.
    pub dependency_type: DependencyType,
}

/// The outcome of resolving an atom's blockers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockResult {
    /// Whether any blocker applies.
    pub blocked: bool,
    /// Every contributing blocker.
    pub blockers: Vec<Blocker>,
}

/// Resolves blocking status against a fixed index and wall-clock time,
/// memoising per atom for the lifetime of one resolver (one readiness
/// query's worth of calls).
pub struct Resolver<'a> {
    index: &'a Indexer,
    memo: std::cell::RefCell<HashMap<AtomId, BlockResult>>,
    closed_memo: std::cell::RefCell<HashMap<AtomId, bool>>,
}

impl<'a> Resolver<'a> {
    /// Build a resolver over `index`. `now` is accepted for interface
    /// symmetry with the readiness calculator, which also consults it for
    /// deferral, but the blocking rules themselves only need atom status.
    #[must_use]
    pub fn new(index: &'a Indexer, _now: DateTime<Utc>) -> Self {
        Self {
            index,
            memo: std::cell::RefCell::new(HashMap::new()),
            closed_memo: std::cell::RefCell::new(HashMap::new()),
        }
    }

    /// Resolve the full blocker set for `id`.
    #[must_use]
    pub fn resolve(&self, id: &AtomId) -> BlockResult {
        if let Some(cached) = self.memo.borrow().get(id) {
            return cached.clone();
        }
        let result = self.resolve_uncached(id);
        self.memo.borrow_mut().insert(id.clone(), result.clone());
        result
    }

    fn resolve_uncached(&self, id: &AtomId) -> BlockResult {
        let Some(atom) = self.index.find_by_id(id) else {
            return BlockResult::default();
        };
        let mut blockers = Vec::new();

        for bond in self.index.bonds_to(id) {
            let Some(source) = self.index.find_by_id(&bond.source_id) else {
                continue;
            };
            let blocks = match bond.dependency_type {
                DependencyType::Blocks | DependencyType::ParentChild => source.status != Status::Closed,
                DependencyType::ConditionalBlocks => {
                    source.status != Status::Closed || source.close_reason_indicates_failure()
                }
                DependencyType::WaitsFor => {
                    source.status == Status::Open || self.any_blocking_descendant_open(&bond.source_id, id)
                }
                DependencyType::Related
                | DependencyType::Duplicates
                | DependencyType::DiscoveredFrom
                | DependencyType::RepliesTo => false,
            };
            if blocks {
                blockers.push(Blocker {
                    source_id: bond.source_id.clone(),
                    dependency_type: bond.dependency_type,
                });
            }
        }

        if let Some(parent_id) = &atom.parent_id {
            if self.blocking_parent(parent_id) {
                blockers.push(Blocker {
                    source_id: parent_id.clone(),
                    dependency_type: DependencyType::ParentChild,
                });
            }
        }

        BlockResult {
            blocked: !blockers.is_empty(),
            blockers,
        }
    }

    /// Whether `parent_id`, or any of its own ancestors, is not closed.
    ///
    /// `parent_id` chains are expected to be acyclic, but the on-disk
    /// format is hand-editable, so this walks iteratively with a visited
    /// set rather than recursing straight into a malformed cycle.
    fn blocking_parent(&self, parent_id: &AtomId) -> bool {
        if let Some(cached) = self.closed_memo.borrow().get(parent_id) {
            return *cached;
        }
        let mut chain = Vec::new();
        let mut visited = std::collections::HashSet::new();
        let mut current = parent_id.clone();
        let result = loop {
            if let Some(cached) = self.closed_memo.borrow().get(&current) {
                break *cached;
            }
            if !visited.insert(current.clone()) {
                break false;
            }
            chain.push(current.clone());
            match self.index.find_by_id(&current) {
                None => break false,
                Some(parent) if parent.status != Status::Closed => break true,
                Some(parent) => match &parent.parent_id {
                    Some(grandparent) => current = grandparent.clone(),
                    None => break false,
                },
            }
        };
        for id in chain {
            self.closed_memo.borrow_mut().insert(id, result);
        }
        result
    }

    /// Any transitive blocking descendant of `source` (excluding
    /// `exclude`, the `waits_for` bond's own target) whose status is
    /// `Open`.
    fn any_blocking_descendant_open(&self, source: &AtomId, exclude: &AtomId) -> bool {
        all_descendants(self.index, source, true)
            .iter()
            .filter(|d| *d != exclude)
            .any(|d| {
                self.index
                    .find_by_id(d)
                    .is_some_and(|a| a.status == Status::Open)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::RepoName;
    use crate::model::{Atom, Bond, IssueType};

    fn make_atom(title: &str) -> Atom {
        let id = AtomId::generate(RepoName::sanitize("proj").unwrap());
        Atom::new(id, title, IssueType::Task, Utc::now()).unwrap()
    }

    #[test]
    fn blocks_bond_blocks_while_source_open() {
        let a = make_atom("a");
        let mut b = make_atom("b");
        b.parent_id = None;
        let bond = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a.clone(), b.clone()], vec![bond], vec![]);
        let resolver = Resolver::new(&idx, Utc::now());
        assert!(resolver.resolve(&b.id).blocked);
    }

    #[test]
    fn blocks_bond_releases_once_source_closed() {
        let mut a = make_atom("a");
        a.status = Status::Closed;
        let b = make_atom("b");
        let bond = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a, b.clone()], vec![bond], vec![]);
        let resolver = Resolver::new(&idx, Utc::now());
        assert!(!resolver.resolve(&b.id).blocked);
    }

    #[test]
    fn conditional_blocks_releases_on_success_blocks_on_failure() {
        let mut success = make_atom("t1-success");
        success.status = Status::Closed;
        success.close_reason = Some("success".to_owned());
        let h1 = make_atom("h1");
        let bond = Bond::new(success.id.clone(), h1.id.clone(), DependencyType::ConditionalBlocks, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![success, h1.clone()], vec![bond], vec![]);
        let resolver = Resolver::new(&idx, Utc::now());
        assert!(!resolver.resolve(&h1.id).blocked);

        let mut failure = make_atom("t1-fail");
        failure.status = Status::Closed;
        failure.close_reason = Some("failed: timeout".to_owned());
        let h2 = make_atom("h2");
        let bond2 = Bond::new(failure.id.clone(), h2.id.clone(), DependencyType::ConditionalBlocks, Utc::now()).unwrap();
        let mut idx2 = Indexer::new();
        idx2.rebuild(vec![failure, h2.clone()], vec![bond2], vec![]);
        let resolver2 = Resolver::new(&idx2, Utc::now());
        assert!(resolver2.resolve(&h2.id).blocked);
    }

    #[test]
    fn waits_for_blocks_while_source_or_descendant_open() {
        let a = make_atom("a");
        let b = make_atom("b");
        let c = make_atom("c");
        let wf1 = Bond::new(c.id.clone(), a.id.clone(), DependencyType::WaitsFor, Utc::now()).unwrap();
        let wf2 = Bond::new(c.id.clone(), b.id.clone(), DependencyType::WaitsFor, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a.clone(), b.clone(), c.clone()], vec![wf1, wf2], vec![]);
        let resolver = Resolver::new(&idx, Utc::now());
        assert!(resolver.resolve(&c.id).blocked);
    }

    #[test]
    fn synthetic_parent_child_blocker_from_parent_id() {
        let parent = make_atom("epic");
        let mut child = make_atom("child");
        child.parent_id = Some(parent.id.clone());
        let mut idx = Indexer::new();
        idx.rebuild(vec![parent.clone(), child.clone()], vec![], vec![]);
        let resolver = Resolver::new(&idx, Utc::now());
        let result = resolver.resolve(&child.id);
        assert!(result.blocked);
        assert_eq!(result.blockers[0].source_id, parent.id);
    }

    #[test]
    fn non_blocking_bond_never_blocks() {
        let a = make_atom("a");
        let b = make_atom("b");
        let bond = Bond::new(a.id.clone(), b.id.clone(), DependencyType::Related, Utc::now()).unwrap();
        let mut idx = Indexer::new();
        idx.rebuild(vec![a, b.clone()], vec![bond], vec![]);
        let resolver = Resolver::new(&idx, Utc::now());
        assert!(!resolver.resolve(&b.id).blocked);
    }
}
