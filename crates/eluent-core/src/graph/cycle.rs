//! Cycle prevention: reject a new blocking bond if it would close a loop.

use std::collections::{HashMap, VecDeque};

use crate::index::Indexer;
use crate::model::types::AtomId;
use crate::model::DependencyType;

/// Result of a cycle check: either the bond is safe to add, or the closed
/// loop `source -> target -> ... -> source` the new bond would create.
#[derive(Debug, PartialEq, Eq)]
pub enum CycleCheck {
    /// No existing path from `target` back to `source`; safe to add.
    Safe,
    /// Adding the bond would create a cycle; carries the closed loop
    /// `source -> target -> ... -> source`, starting and ending at the
    /// bond's own source.
    Cycle(Vec<AtomId>),
}

/// Before creating a blocking bond `source -> target`, BFS forward from
/// `target` across existing blocking edges. If `source` is reachable, the
/// new edge would close a cycle. Non-blocking bond types are never
/// checked (callers should skip calling this for them).
#[must_use]
pub fn check(index: &Indexer, source: &AtomId, target: &AtomId, dependency_type: DependencyType) -> CycleCheck {
    debug_assert!(dependency_type.is_blocking(), "cycle check only applies to blocking bonds");
    if source == target {
        // Bond construction itself rejects self-references; this is a
        // defensive fallback that still reports a (trivial) cycle.
        return CycleCheck::Cycle(vec![source.clone(), target.clone()]);
    }

    let mut came_from: HashMap<AtomId, AtomId> = HashMap::new();
    let mut queue = VecDeque::new();
    queue.push_back(target.clone());
    let mut visited = std::collections::HashSet::new();
    visited.insert(target.clone());

    while let Some(current) = queue.pop_front() {
        if &current == source {
            let mut path = vec![current.clone()];
            let mut cursor = current;
            while let Some(prev) = came_from.get(&cursor) {
                path.push(prev.clone());
                cursor = prev.clone();
            }
            path.reverse();
            path.insert(0, source.clone());
            return CycleCheck::Cycle(path);
        }
        for bond in index.bonds_from(&current) {
            if !bond.dependency_type.is_blocking() {
                continue;
            }
            if visited.insert(bond.target_id.clone()) {
                came_from.insert(bond.target_id.clone(), current.clone());
                queue.push_back(bond.target_id.clone());
            }
        }
    }
    CycleCheck::Safe
}
