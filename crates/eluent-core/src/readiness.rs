//! The readiness calculator: which atoms are ready for an agent to claim,
//! under a set of filters and a sort policy.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};

use crate::graph::blocking::Resolver;
use crate::index::Indexer;
use crate::model::types::AtomId;
use crate::model::{Atom, IssueType, Priority};

/// How caller-supplied label filters combine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LabelMatch {
    /// Every listed label must be present.
    All,
    /// At least one listed label must be present.
    Any,
}

/// Filters applied before (and independent of) the blocking check.
#[derive(Clone, Debug, Default)]
pub struct ReadinessFilter {
    /// Restrict to this exact priority.
    pub priority: Option<Priority>,
    /// Restrict to this assignee.
    pub assignee: Option<String>,
    /// Labels to match, combined per `label_match`.
    pub labels: Vec<String>,
    /// How `labels` combines; ignored if `labels` is empty.
    pub label_match: LabelMatch,
    /// Restrict to atoms in the subtree rooted at this atom (inclusive of
    /// the root's other descendants, exclusive of the root itself, which
    /// is typically an abstract epic and excluded anyway).
    pub parent_subtree: Option<AtomId>,
    /// If set, only these issue types are considered.
    pub include_types: Option<HashSet<IssueType>>,
    /// These issue types are never considered, even if `include_types`
    /// would otherwise allow them.
    pub exclude_types: HashSet<IssueType>,
    /// Include abstract types (`epic`, `formula`) even though they're
    /// normally excluded from ready queries.
    pub include_abstract: bool,
    /// Cap the number of results.
    pub limit: Option<usize>,
}

impl Default for LabelMatch {
    fn default() -> Self {
        Self::All
    }
}

/// How to order the ready set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortPolicy {
    /// Ascending priority (0 = highest, sorts first), then ascending
    /// `created_at`.
    Priority,
    /// Ascending `created_at`.
    Oldest,
    /// Anti-starvation: atoms older than 48h are emitted first (oldest
    /// first), then the rest ordered by priority.
    Hybrid,
}

const HYBRID_AGE_THRESHOLD_HOURS: i64 = 48;

fn passes_filters(atom: &Atom, filter: &ReadinessFilter, index: &Indexer) -> bool {
    if let Some(p) = filter.priority {
        if atom.priority != p {
            return false;
        }
    }
    if let Some(assignee) = &filter.assignee {
        if atom.assignee.as_deref() != Some(assignee.as_str()) {
            return false;
        }
    }
    if !filter.labels.is_empty() {
        let matched = match filter.label_match {
            LabelMatch::All => filter.labels.iter().all(|l| atom.labels.contains(l)),
            LabelMatch::Any => filter.labels.iter().any(|l| atom.labels.contains(l)),
        };
        if !matched {
            return false;
        }
    }
    if let Some(root) = &filter.parent_subtree {
        if !is_descendant_of(index, atom, root) {
            return false;
        }
    }
    if let Some(include) = &filter.include_types {
        if !include.contains(&atom.issue_type) {
            return false;
        }
    }
    if filter.exclude_types.contains(&atom.issue_type) {
        return false;
    }
    true
}

fn is_descendant_of(index: &Indexer, atom: &Atom, root: &AtomId) -> bool {
    let mut current = atom.parent_id.clone();
    let mut visited = std::collections::HashSet::new();
    while let Some(parent_id) = current {
        if &parent_id == root {
            return true;
        }
        if !visited.insert(parent_id.clone()) {
            return false;
        }
        current = index.find_by_id(&parent_id).and_then(|a| a.parent_id.clone());
    }
    false
}

/// Compute the ready set: unblocked, non-terminal, non-deferred,
/// non-abstract (unless requested) atoms matching `filter`, ordered by
/// `sort`.
#[must_use]
pub fn ready(index: &Indexer, now: DateTime<Utc>, filter: &ReadinessFilter, sort: SortPolicy) -> Vec<AtomId> {
    let resolver = Resolver::new(index, now);

    let mut candidates: Vec<&Atom> = index
        .all_atoms()
        .filter(|atom| filter.include_abstract || !atom.is_abstract())
        .filter(|atom| !atom.status.is_terminal())
        .filter(|atom| atom.is_due(now))
        .filter(|atom| passes_filters(atom, filter, index))
        .filter(|atom| !resolver.resolve(&atom.id).blocked)
        .collect();

    sort_candidates(&mut candidates, sort, now);

    let iter = candidates.into_iter().map(|a| a.id.clone());
    match filter.limit {
        Some(limit) => iter.take(limit).collect(),
        None => iter.collect(),
    }
}

/// Whether `atom` individually satisfies the readiness predicate, ignoring
/// every [`ReadinessFilter`] (used by callers that already have an atom in
/// hand and just want a yes/no, e.g. `Testable Properties` checks).
#[must_use]
pub fn is_ready(index: &Indexer, atom: &Atom, now: DateTime<Utc>, include_abstract: bool) -> bool {
    (include_abstract || !atom.is_abstract())
        && !atom.status.is_terminal()
        && atom.is_due(now)
        && !Resolver::new(index, now).resolve(&atom.id).blocked
}

fn sort_candidates(candidates: &mut [&Atom], sort: SortPolicy, now: DateTime<Utc>) {
    match sort {
        SortPolicy::Priority => {
            candidates.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
        }
        SortPolicy::Oldest => {
            candidates.sort_by_key(|a| a.created_at);
        }
        SortPolicy::Hybrid => {
            let threshold = Duration::hours(HYBRID_AGE_THRESHOLD_HOURS);
            let (mut old, mut recent): (Vec<&Atom>, Vec<&Atom>) =
                candidates.iter().partition(|a| now - a.created_at >= threshold);
            old.sort_by_key(|a| a.created_at);
            recent.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.created_at.cmp(&b.created_at)));
            old.extend(recent);
            candidates.clone_from_slice(&old);
        }
    }
}
