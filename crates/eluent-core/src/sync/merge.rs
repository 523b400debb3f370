//! The three-way merge: per-field-kind strategies over atoms, bonds, and
//! comments, keyed by field semantics rather than by name.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::graph::cycle::{self, CycleCheck};
use crate::index::Indexer;
use crate::model::types::{AtomId, CommentId};
use crate::model::{Atom, Bond, Comment, Status};

/// One side's full set of records, as loaded from a JSONL file at some
/// point in the commit history (`base`, `local`, or `remote`).
#[derive(Clone, Debug, Default)]
pub struct RepoSnapshot {
    /// Atoms keyed by ID.
    pub atoms: BTreeMap<AtomId, Atom>,
    /// Every bond (identity is the triple, so a `Vec` is fine).
    pub bonds: Vec<Bond>,
    /// Every comment.
    pub comments: Vec<Comment>,
}

/// A field that both sides changed, to different values, neither equal to
/// base — resolved deterministically by last-write-wins, but recorded so
/// callers can surface it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldConflict {
    /// The atom the conflict occurred on.
    pub atom_id: AtomId,
    /// The field name that conflicted.
    pub field: &'static str,
}

/// A bond dropped from the merged set because applying it would have
/// closed a cycle that neither replica had on its own (each side's own
/// bonds were acyclic; only their union was not).
#[derive(Clone, Debug, PartialEq)]
pub struct RejectedBond {
    /// The bond that was dropped.
    pub bond: Bond,
    /// The closed loop it would have created, as reported by
    /// [`cycle::check`].
    pub cycle: Vec<AtomId>,
}

/// The result of merging three snapshots.
#[derive(Clone, Debug, Default)]
pub struct MergeOutcome {
    /// The merged record set.
    pub merged: RepoSnapshot,
    /// Every scalar-field conflict that was resolved by LWW.
    pub conflicts: Vec<FieldConflict>,
    /// Bonds dropped because the union of both sides' bonds was cyclic.
    pub rejected_bonds: Vec<RejectedBond>,
}

/// Merge `local` and `remote` against their common ancestor `base`.
///
/// Commutative in `local`/`remote`: `merge(base, local, remote) ==
/// merge(base, remote, local)`, since every tie-break compares the two
/// candidate values directly rather than favouring either argument
/// position.
#[must_use]
pub fn merge(base: &RepoSnapshot, local: &RepoSnapshot, remote: &RepoSnapshot) -> MergeOutcome {
    let mut conflicts = Vec::new();
    let mut atoms = BTreeMap::new();

    let mut ids: Vec<&AtomId> = local.atoms.keys().chain(remote.atoms.keys()).collect();
    ids.sort();
    ids.dedup();

    for id in ids {
        let base_atom = base.atoms.get(id);
        let local_atom = local.atoms.get(id);
        let remote_atom = remote.atoms.get(id);
        if let Some(merged) = merge_atom(id, base_atom, local_atom, remote_atom, &mut conflicts) {
            atoms.insert(id.clone(), merged);
        }
    }

    let (bonds, rejected_bonds) = reject_cyclic_bonds(merge_bonds(&local.bonds, &remote.bonds));
    let comments = merge_comments(&local.comments, &remote.comments);

    MergeOutcome {
        merged: RepoSnapshot { atoms, bonds, comments },
        conflicts,
        rejected_bonds,
    }
}

/// Merge one atom's three versions. Returns `None` when the atom should be
/// hard-deleted from the merged set (discarded on both sides).
fn merge_atom(
    id: &AtomId,
    base: Option<&Atom>,
    local: Option<&Atom>,
    remote: Option<&Atom>,
    conflicts: &mut Vec<FieldConflict>,
) -> Option<Atom> {
    match (local, remote) {
        (None, None) => None,
        (Some(l), None) => Some(l.clone()),
        (None, Some(r)) => Some(r.clone()),
        (Some(l), Some(r)) => merge_present_atom(id, base, l, r, conflicts),
    }
}

fn merge_present_atom(
    id: &AtomId,
    base: Option<&Atom>,
    local: &Atom,
    remote: &Atom,
    conflicts: &mut Vec<FieldConflict>,
) -> Option<Atom> {
    if local.status == Status::Discard && remote.status == Status::Discard {
        return None;
    }

    let base_updated_at = base.map(|b| b.updated_at);
    let base_metadata = base.map(|b| &b.metadata);

    if let Some(resurrected) = resurrect(id, base_updated_at, base_metadata, local, remote, conflicts) {
        return Some(resurrected);
    }
    if let Some(resurrected) = resurrect(id, base_updated_at, base_metadata, remote, local, conflicts) {
        return Some(resurrected);
    }

    Some(merge_scalars(id, base, local, remote, conflicts))
}

/// If `discard_side` is discarded and `edit_side` is not, apply the
/// resurrection rule: the edit wins (status cleared) when it postdates
/// base; otherwise the discard wins. Returns `None` when the rule doesn't
/// apply (neither or both sides discarded, handled by the caller).
fn resurrect(
    id: &AtomId,
    base_updated_at: Option<DateTime<Utc>>,
    base_metadata: Option<&std::collections::BTreeMap<String, serde_json::Value>>,
    discard_side: &Atom,
    edit_side: &Atom,
    conflicts: &mut Vec<FieldConflict>,
) -> Option<Atom> {
    if discard_side.status != Status::Discard || edit_side.status == Status::Discard {
        return None;
    }
    let edit_is_newer = base_updated_at.is_none_or(|bu| edit_side.updated_at > bu);
    if edit_is_newer {
        let mut winner = edit_side.clone();
        winner.labels = local_union(&discard_side.labels, &edit_side.labels);
        winner.created_at = discard_side.created_at.min(edit_side.created_at);
        winner.updated_at = discard_side.updated_at.max(edit_side.updated_at);
        winner.metadata = merge_metadata(base_metadata, &discard_side.metadata, &edit_side.metadata, id, conflicts);
        Some(winner)
    } else {
        conflicts.push(FieldConflict { atom_id: id.clone(), field: "status" });
        Some(discard_side.clone())
    }
}

fn local_union(a: &std::collections::BTreeSet<String>, b: &std::collections::BTreeSet<String>) -> std::collections::BTreeSet<String> {
    a.union(b).cloned().collect()
}

/// Whichever side has the later `updated_at` wins scalar fields; an exact
/// tie is broken by comparing the two atoms' canonical JSON text, which is
/// deterministic and order-independent of the `local`/`remote` labels.
fn merge_scalars(id: &AtomId, base: Option<&Atom>, local: &Atom, remote: &Atom, conflicts: &mut Vec<FieldConflict>) -> Atom {
    let winner = pick_winner(local, remote);
    let mut out = winner.clone();

    record_scalar_conflict(id, base.map(|b| &b.title), &local.title, &remote.title, "title", conflicts);
    record_scalar_conflict(id, base.map(|b| &b.status), &local.status, &remote.status, "status", conflicts);
    record_scalar_conflict(
        id,
        base.map(|b| &b.priority),
        &local.priority,
        &remote.priority,
        "priority",
        conflicts,
    );
    record_scalar_conflict(id, base.map(|b| &b.assignee), &local.assignee, &remote.assignee, "assignee", conflicts);

    out.labels = local_union(&local.labels, &remote.labels);
    out.created_at = local.created_at.min(remote.created_at);
    out.updated_at = local.updated_at.max(remote.updated_at);
    out.metadata = merge_metadata(base.map(|b| &b.metadata), &local.metadata, &remote.metadata, id, conflicts);
    out
}

fn pick_winner<'a>(local: &'a Atom, remote: &'a Atom) -> &'a Atom {
    match local.updated_at.cmp(&remote.updated_at) {
        std::cmp::Ordering::Greater => local,
        std::cmp::Ordering::Less => remote,
        std::cmp::Ordering::Equal => {
            let local_json = serde_json::to_string(local).unwrap_or_default();
            let remote_json = serde_json::to_string(remote).unwrap_or_default();
            if local_json >= remote_json {
                local
            } else {
                remote
            }
        }
    }
}

fn record_scalar_conflict<T: PartialEq>(
    id: &AtomId,
    base: Option<&T>,
    local: &T,
    remote: &T,
    field: &'static str,
    conflicts: &mut Vec<FieldConflict>,
) {
    if local == remote {
        return;
    }
    let base_matches_either = base.is_some_and(|b| b == local || b == remote);
    if !base_matches_either {
        conflicts.push(FieldConflict { atom_id: id.clone(), field });
    }
}

/// Key-wise union with per-key last-write-wins on differing values. There
/// is no per-key timestamp, so a genuine conflicting overwrite (both sides
/// changed the same key to different values, neither matching base) is
/// resolved by string-comparing the two JSON-encoded values, deterministic
/// regardless of argument order.
fn merge_metadata(
    base: Option<&BTreeMap<String, serde_json::Value>>,
    local: &BTreeMap<String, serde_json::Value>,
    remote: &BTreeMap<String, serde_json::Value>,
    id: &AtomId,
    conflicts: &mut Vec<FieldConflict>,
) -> BTreeMap<String, serde_json::Value> {
    let mut out = BTreeMap::new();
    let mut keys: Vec<&String> = local.keys().chain(remote.keys()).collect();
    keys.sort();
    keys.dedup();
    for key in keys {
        match (local.get(key), remote.get(key)) {
            (Some(l), None) => {
                out.insert(key.clone(), l.clone());
            }
            (None, Some(r)) => {
                out.insert(key.clone(), r.clone());
            }
            (Some(l), Some(r)) if l == r => {
                out.insert(key.clone(), l.clone());
            }
            (Some(l), Some(r)) => {
                let base_val = base.and_then(|m| m.get(key));
                if base_val != Some(l) && base_val != Some(r) {
                    conflicts.push(FieldConflict { atom_id: id.clone(), field: "metadata" });
                }
                let winner = if l.to_string() >= r.to_string() { l } else { r };
                out.insert(key.clone(), winner.clone());
            }
            (None, None) => unreachable!("key came from one of the two maps"),
        }
    }
    out
}

/// Union bonds, deduplicated by `(source, target, type)`, keeping the
/// earlier `created_at` on a duplicate.
fn merge_bonds(local: &[Bond], remote: &[Bond]) -> Vec<Bond> {
    let mut by_identity: BTreeMap<(AtomId, AtomId, crate::model::DependencyType), Bond> = BTreeMap::new();
    for bond in local.iter().chain(remote.iter()) {
        by_identity
            .entry(bond.identity())
            .and_modify(|existing| {
                if bond_rank(bond) < bond_rank(existing) {
                    *existing = bond.clone();
                }
            })
            .or_insert_with(|| bond.clone());
    }
    by_identity.into_values().collect()
}

/// A deterministic total order over bonds of the same identity, used to
/// pick a winner when both sides created the same edge at the exact same
/// `created_at` but with different `metadata`. Ranking by the bond's own
/// canonical serialization rather than insertion order keeps the result of
/// `merge_bonds` independent of whether it's called as `(local, remote)`
/// or `(remote, local)` — required for `merge`'s documented commutativity.
fn bond_rank(bond: &Bond) -> (DateTime<Utc>, String) {
    (bond.created_at, serde_json::to_string(bond).unwrap_or_default())
}

/// Two independently-acyclic bond sets can union into a cyclic one even
/// though neither side's own graph had a loop. Walk the deduplicated bonds
/// in their deterministic (identity-sorted) order, admitting each blocking
/// bond only if it doesn't close a loop against the bonds admitted so far,
/// and report anything dropped.
fn reject_cyclic_bonds(bonds: Vec<Bond>) -> (Vec<Bond>, Vec<RejectedBond>) {
    let mut index = Indexer::new();
    let mut kept = Vec::new();
    let mut rejected = Vec::new();
    for bond in bonds {
        if bond.dependency_type.is_blocking() {
            if let CycleCheck::Cycle(path) =
                cycle::check(&index, &bond.source_id, &bond.target_id, bond.dependency_type)
            {
                rejected.push(RejectedBond { bond, cycle: path });
                continue;
            }
        }
        index.index_bond(bond.clone());
        kept.push(bond);
    }
    (kept, rejected)
}

/// Union comments, deduplicated by content digest, sorted by `created_at`.
/// Union both sides' comments, deduplicating exact repeats by content and
/// disambiguating concurrent ones.
///
/// Sequence numbers are assigned locally per atom (`repo::Repository::
/// add_comment`'s `count-of-existing + 1`), so two agents commenting on the
/// same atom while offline can independently produce the same `CommentId`
/// for two different comments. Deduplicating by digest alone would let both
/// survive with a colliding ID; this renumbers every collision after the
/// first (by creation order) onto the next free sequence for that atom
/// instead of letting one silently overwrite the other.
fn merge_comments(local: &[Comment], remote: &[Comment]) -> Vec<Comment> {
    let mut by_digest: BTreeMap<String, Comment> = BTreeMap::new();
    for comment in local.iter().chain(remote.iter()) {
        by_digest.entry(comment.content_digest()).or_insert_with(|| comment.clone());
    }
    let mut deduped: Vec<Comment> = by_digest.into_values().collect();
    deduped.sort_by_key(|c| (c.created_at, c.content_digest()));

    let mut next_free_sequence: BTreeMap<AtomId, u32> = BTreeMap::new();
    for comment in &deduped {
        let slot = next_free_sequence.entry(comment.id.atom_id().clone()).or_insert(0);
        *slot = (*slot).max(comment.id.sequence());
    }

    let mut seen: std::collections::BTreeSet<CommentId> = std::collections::BTreeSet::new();
    let mut out = Vec::with_capacity(deduped.len());
    for mut comment in deduped {
        if !seen.insert(comment.id.clone()) {
            let next = next_free_sequence.get_mut(comment.id.atom_id()).expect("seeded above");
            *next += 1;
            comment.id = CommentId::new(comment.id.atom_id().clone(), *next);
            seen.insert(comment.id.clone());
        }
        out.push(comment);
    }
    out.sort_by_key(|c| c.created_at);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::RepoName;
    use crate::model::IssueType;

    fn atom(repo: &str, created: DateTime<Utc>) -> Atom {
        let id = AtomId::generate(RepoName::sanitize(repo).unwrap());
        Atom::new(id, "t", IssueType::Task, created).unwrap()
    }

    fn snapshot(atoms: Vec<Atom>) -> RepoSnapshot {
        RepoSnapshot {
            atoms: atoms.into_iter().map(|a| (a.id.clone(), a)).collect(),
            bonds: Vec::new(),
            comments: Vec::new(),
        }
    }

    #[test]
    fn resurrection_rule_per_spec_scenario_seven() {
        let now = Utc::now();
        let mut a = atom("proj", now);
        a.status = Status::Open;
        let base = snapshot(vec![a.clone()]);

        let mut local = a.clone();
        local.status = Status::Discard;
        local.updated_at = now;

        let mut remote = a.clone();
        remote.title = "x".to_owned();
        remote.updated_at = now + chrono::Duration::seconds(1);

        let outcome = merge(&base, &snapshot(vec![local]), &snapshot(vec![remote]));
        let merged = outcome.merged.atoms.get(&a.id).expect("atom survives merge");
        assert_eq!(merged.status, Status::Open);
        assert_eq!(merged.title, "x");
    }

    #[test]
    fn discard_wins_when_edit_is_not_newer_than_base() {
        let now = Utc::now();
        let mut a = atom("proj", now);
        a.updated_at = now + chrono::Duration::seconds(5);
        let base = snapshot(vec![a.clone()]);

        let mut local = a.clone();
        local.status = Status::Discard;
        local.updated_at = now + chrono::Duration::seconds(10);

        let mut remote = a.clone();
        remote.title = "ignored edit".to_owned();
        remote.updated_at = now + chrono::Duration::seconds(1);

        let outcome = merge(&base, &snapshot(vec![local]), &snapshot(vec![remote]));
        let merged = outcome.merged.atoms.get(&a.id).unwrap();
        assert_eq!(merged.status, Status::Discard);
    }

    #[test]
    fn resurrection_does_not_flag_a_metadata_key_neither_side_actually_contested() {
        let now = Utc::now();
        let mut a = atom("proj", now);
        a.metadata.insert("k".to_owned(), serde_json::json!("1"));
        let base = snapshot(vec![a.clone()]);

        let mut local = a.clone();
        local.status = Status::Discard;
        local.updated_at = now;

        let mut remote = a.clone();
        remote.title = "x".to_owned();
        remote.metadata.insert("k".to_owned(), serde_json::json!("2"));
        remote.updated_at = now + chrono::Duration::seconds(1);

        let outcome = merge(&base, &snapshot(vec![local]), &snapshot(vec![remote]));
        let merged = outcome.merged.atoms.get(&a.id).expect("atom survives merge");
        assert_eq!(merged.metadata.get("k"), Some(&serde_json::json!("2")));
        assert!(outcome.conflicts.iter().all(|c| c.field != "metadata"));
    }

    #[test]
    fn both_sides_discarded_hard_deletes() {
        let now = Utc::now();
        let mut a = atom("proj", now);
        let base = snapshot(vec![a.clone()]);
        a.status = Status::Discard;
        let outcome = merge(&base, &snapshot(vec![a.clone()]), &snapshot(vec![a.clone()]));
        assert!(outcome.merged.atoms.is_empty());
    }

    #[test]
    fn merge_is_commutative() {
        let now = Utc::now();
        let mut a = atom("proj", now);
        let base = snapshot(vec![a.clone()]);

        let mut local = a.clone();
        local.priority = crate::model::Priority::new(0).unwrap();
        local.updated_at = now + chrono::Duration::seconds(1);

        a.labels.insert("urgent".to_owned());
        let mut remote = a.clone();
        remote.labels.insert("backend".to_owned());
        remote.updated_at = now + chrono::Duration::seconds(2);

        let forward = merge(&base, &snapshot(vec![local.clone()]), &snapshot(vec![remote.clone()]));
        let backward = merge(&base, &snapshot(vec![remote]), &snapshot(vec![local]));
        assert_eq!(
            forward.merged.atoms.get(&a.id).map(|m| &m.labels),
            backward.merged.atoms.get(&a.id).map(|m| &m.labels)
        );
        assert_eq!(
            forward.merged.atoms.get(&a.id).map(|m| m.priority),
            backward.merged.atoms.get(&a.id).map(|m| m.priority)
        );
    }

    #[test]
    fn labels_union_across_sides() {
        let now = Utc::now();
        let a = atom("proj", now);
        let base = snapshot(vec![a.clone()]);
        let mut local = a.clone();
        local.labels.insert("a".to_owned());
        let mut remote = a.clone();
        remote.labels.insert("b".to_owned());
        let outcome = merge(&base, &snapshot(vec![local]), &snapshot(vec![remote]));
        let merged = outcome.merged.atoms.get(&a.id).unwrap();
        assert!(merged.labels.contains("a") && merged.labels.contains("b"));
    }

    #[test]
    fn bonds_deduplicated_by_identity() {
        let now = Utc::now();
        let a = atom("proj", now);
        let b = atom("proj", now);
        let bond_local = Bond::new(a.id.clone(), b.id.clone(), crate::model::DependencyType::Blocks, now).unwrap();
        let mut bond_remote = bond_local.clone();
        bond_remote.created_at = now - chrono::Duration::seconds(5);
        let merged = merge_bonds(&[bond_local], &[bond_remote]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].created_at, now - chrono::Duration::seconds(5));
    }

    #[test]
    fn a_union_that_closes_a_cycle_is_rejected_even_though_each_side_was_acyclic() {
        let now = Utc::now();
        let a = atom("proj", now);
        let b = atom("proj", now);
        let c = atom("proj", now);
        // Local only knows A -> B -> C; remote only knows C -> A. Neither
        // side's own bond set has a cycle.
        let ab = Bond::new(a.id.clone(), b.id.clone(), crate::model::DependencyType::Blocks, now).unwrap();
        let bc = Bond::new(b.id.clone(), c.id.clone(), crate::model::DependencyType::Blocks, now).unwrap();
        let ca = Bond::new(c.id.clone(), a.id.clone(), crate::model::DependencyType::Blocks, now).unwrap();

        let outcome = merge(&RepoSnapshot::default(), &snapshot_with_bonds(vec![ab.clone(), bc.clone()]), &snapshot_with_bonds(vec![ca.clone()]));

        assert_eq!(outcome.merged.bonds.len(), 2);
        assert_eq!(outcome.rejected_bonds.len(), 1);
        assert_eq!(outcome.rejected_bonds[0].bond.identity(), ca.identity());
    }

    fn snapshot_with_bonds(bonds: Vec<Bond>) -> RepoSnapshot {
        RepoSnapshot { atoms: BTreeMap::new(), bonds, comments: Vec::new() }
    }

    #[test]
    fn comments_deduplicated_by_content_digest() {
        let now = Utc::now();
        let a = atom("proj", now);
        let c1 = Comment::new(CommentId::new(a.id.clone(), 1), a.id.clone(), "alice", "hi", now).unwrap();
        let c2 = c1.clone();
        let merged = merge_comments(&[c1], &[c2]);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn comments_colliding_on_the_same_id_with_different_content_are_both_kept() {
        let now = Utc::now();
        let a = atom("proj", now);
        // Two agents each add the first comment on `a` while offline from
        // each other: both land on sequence 1, but with different content.
        let local = Comment::new(CommentId::new(a.id.clone(), 1), a.id.clone(), "alice", "local note", now).unwrap();
        let remote =
            Comment::new(CommentId::new(a.id.clone(), 1), a.id.clone(), "bob", "remote note", now + chrono::Duration::seconds(1))
                .unwrap();

        let merged = merge_comments(&[local.clone()], &[remote.clone()]);

        assert_eq!(merged.len(), 2);
        let ids: std::collections::BTreeSet<_> = merged.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 2, "both comments must end up under distinct ids");
        let contents: std::collections::BTreeSet<_> = merged.iter().map(|c| c.content.clone()).collect();
        assert!(contents.contains(&local.content));
        assert!(contents.contains(&remote.content));
    }

    #[test]
    fn metadata_merges_key_wise() {
        let now = Utc::now();
        let a = atom("proj", now);
        let base = snapshot(vec![a.clone()]);
        let mut local = a.clone();
        local.metadata.insert("k1".to_owned(), serde_json::json!("local"));
        let mut remote = a.clone();
        remote.metadata.insert("k2".to_owned(), serde_json::json!("remote"));
        let outcome = merge(&base, &snapshot(vec![local]), &snapshot(vec![remote]));
        let merged = outcome.merged.atoms.get(&a.id).unwrap();
        assert_eq!(merged.metadata.get("k1"), Some(&serde_json::json!("local")));
        assert_eq!(merged.metadata.get("k2"), Some(&serde_json::json!("remote")));
    }
}
