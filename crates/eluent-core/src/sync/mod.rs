//! The three-way merge synchroniser: pull-first sync of `.eluent/data.jsonl`
//! against a git remote, using `.sync-state` to track the last common
//! ancestor.

pub mod merge;
pub mod state;

use std::path::{Path, PathBuf};
use std::time::Duration;

use eluent_git::{GitOid, GitRepo, RefName};

use crate::error::EluentError;
use crate::repo::jsonl::{self, Header, Record};
use merge::{FieldConflict, RejectedBond, RepoSnapshot};
use state::SyncState;

/// Outcome of one [`Synchronizer::sync`] call.
#[derive(Clone, Debug, Default)]
pub struct SyncReport {
    /// Number of atoms present in the merged set.
    pub atoms_changed: usize,
    /// Scalar-field conflicts resolved by last-write-wins.
    pub conflicts: Vec<FieldConflict>,
    /// Bonds dropped because the union of both sides' bonds closed a cycle
    /// that neither side had on its own. Non-empty means the merged graph
    /// written back is acyclic only because these were left out.
    pub rejected_bonds: Vec<RejectedBond>,
    /// Whether anything was actually fetched and merged (`false` when the
    /// remote tracking ref doesn't exist yet, or nothing changed).
    pub merged: bool,
}

/// Orchestrates pull-first sync: fetch, compute a three-way merge against
/// the persisted base, write the merged result back to `data.jsonl`, and
/// update `.sync-state`. Does not push — callers decide when to push,
/// typically after a successful merge with no unresolved conflicts.
pub struct Synchronizer<'a> {
    git: &'a dyn GitRepo,
    eluent_dir: PathBuf,
    remote: String,
    branch: String,
    network_timeout: Duration,
}

impl<'a> Synchronizer<'a> {
    /// Build a synchroniser over `eluent_dir` (a repository's `.eluent`
    /// directory), using `git` against `remote`/`branch`.
    #[must_use]
    pub fn new(
        git: &'a dyn GitRepo,
        eluent_dir: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
        network_timeout: Duration,
    ) -> Self {
        Self {
            git,
            eluent_dir: eluent_dir.into(),
            remote: remote.into(),
            branch: branch.into(),
            network_timeout,
        }
    }

    fn data_path(&self) -> PathBuf {
        self.eluent_dir.join("data.jsonl")
    }

    fn sync_state_path(&self) -> PathBuf {
        self.eluent_dir.join(".sync-state")
    }

    /// Run one sync pass.
    ///
    /// # Errors
    /// Returns an error if the local or remote JSONL cannot be read, the
    /// fetch fails, or `.sync-state` cannot be written.
    pub fn sync(&self) -> Result<SyncReport, EluentError> {
        let local_records = jsonl::load(&self.data_path())?.records;
        let local_header = local_records.iter().find_map(|r| match r {
            Record::Header(h) => Some(h.clone()),
            _ => None,
        });
        let local_snapshot = snapshot_from_records(&local_records);

        let mut state = SyncState::load(&self.sync_state_path());

        let branch_ref = RefName::branch(&self.branch);
        self.git.fetch(&self.remote, &branch_ref, self.network_timeout)?;
        let remote_spec = format!("{}/{}", self.remote, self.branch);
        let Some(remote_head) = self.git.rev_parse(&remote_spec)? else {
            return Ok(SyncReport { merged: false, ..SyncReport::default() });
        };

        if state.remote_head.as_deref() == Some(remote_head.as_str()) {
            return Ok(SyncReport {
                atoms_changed: local_snapshot.atoms.len(),
                merged: false,
                ..SyncReport::default()
            });
        }

        let remote_records = self.read_records_at(&remote_head)?;
        let remote_snapshot = snapshot_from_records(&remote_records);

        let base_snapshot = match &state.base_commit {
            Some(oid) => {
                let base_oid = GitOid::new(oid)?;
                snapshot_from_records(&self.read_records_at(&base_oid)?)
            }
            None => RepoSnapshot::default(),
        };

        let outcome = merge::merge(&base_snapshot, &local_snapshot, &remote_snapshot);

        let header = local_header.unwrap_or_else(|| Header {
            repo_name: self.branch.clone(),
            generator: crate::repo::generator_string(),
            created_at: chrono::Utc::now(),
        });
        let merged_records = snapshot_to_records(header, &outcome.merged);
        jsonl::rewrite(&self.data_path(), &merged_records)?;

        state.base_commit = Some(remote_head.to_string());
        state.remote_head = Some(remote_head.to_string());
        state.last_sync_at = Some(chrono::Utc::now());
        state.save(&self.sync_state_path())?;

        Ok(SyncReport {
            atoms_changed: outcome.merged.atoms.len(),
            conflicts: outcome.conflicts,
            rejected_bonds: outcome.rejected_bonds,
            merged: true,
        })
    }

    /// Materialise `.eluent/data.jsonl` as it existed at `oid` via a
    /// throwaway worktree, read it, and clean the worktree up.
    fn read_records_at(&self, oid: &GitOid) -> Result<Vec<Record>, EluentError> {
        let short = &oid.as_str()[..12.min(oid.as_str().len())];
        let pid = std::process::id();
        let branch_name = format!("eluent-sync-tmp-{pid}-{short}");
        let worktree_path = std::env::temp_dir().join(format!("eluent-sync-{pid}-{short}"));

        self.git.worktree_add(&worktree_path, &branch_name, Some(oid.as_str()))?;
        let loaded = jsonl::load(&worktree_path.join(".eluent").join("data.jsonl"));
        let _ = self.git.worktree_remove(&worktree_path, true);
        let _ = self.git.delete_branch(&branch_name);
        Ok(loaded?.records)
    }
}

fn snapshot_from_records(records: &[Record]) -> RepoSnapshot {
    let mut snapshot = RepoSnapshot::default();
    for record in records {
        match record {
            Record::Header(_) => {}
            Record::Atom(atom) => {
                snapshot.atoms.insert(atom.id.clone(), atom.clone());
            }
            Record::Bond(bond) => snapshot.bonds.push(bond.clone()),
            Record::Comment(comment) => snapshot.comments.push(comment.clone()),
        }
    }
    snapshot
}

fn snapshot_to_records(header: Header, snapshot: &RepoSnapshot) -> Vec<Record> {
    let mut records = vec![Record::Header(header)];
    records.extend(snapshot.atoms.values().cloned().map(Record::Atom));
    records.extend(snapshot.bonds.iter().cloned().map(Record::Bond));
    records.extend(snapshot.comments.iter().cloned().map(Record::Comment));
    records
}

/// Read-only helper mainly useful to tests and to callers that want to
/// inspect a historical snapshot without running a full sync.
#[must_use]
pub fn snapshot_from_path(path: &Path) -> RepoSnapshot {
    jsonl::load(path)
        .map(|loaded| snapshot_from_records(&loaded.records))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::RepoName;
    use crate::model::{Atom, IssueType};
    use chrono::Utc;

    #[test]
    fn snapshot_round_trips_through_records() {
        let id = crate::model::types::AtomId::generate(RepoName::sanitize("proj").unwrap());
        let atom = Atom::new(id, "t", IssueType::Task, Utc::now()).unwrap();
        let records = vec![
            Record::Header(Header {
                repo_name: "proj".to_owned(),
                generator: "eluent/0.1.0".to_owned(),
                created_at: Utc::now(),
            }),
            Record::Atom(atom.clone()),
        ];
        let snapshot = snapshot_from_records(&records);
        assert_eq!(snapshot.atoms.get(&atom.id), Some(&atom));
    }

    #[test]
    fn no_remote_tracking_ref_yields_unmerged_report() {
        struct NoRemoteGit;
        impl GitRepo for NoRemoteGit {
            fn rev_parse(&self, _spec: &str) -> Result<Option<GitOid>, eluent_git::GitError> {
                Ok(None)
            }
            fn is_ancestor(&self, _a: &GitOid, _b: &GitOid) -> Result<bool, eluent_git::GitError> {
                Ok(false)
            }
            fn current_branch(&self, _p: &Path) -> Result<Option<String>, eluent_git::GitError> {
                Ok(None)
            }
            fn worktree_add(&self, _p: &Path, _b: &str, _s: Option<&str>) -> Result<(), eluent_git::GitError> {
                Ok(())
            }
            fn worktree_remove(&self, _p: &Path, _f: bool) -> Result<(), eluent_git::GitError> {
                Ok(())
            }
            fn worktree_list(&self) -> Result<Vec<eluent_git::WorktreeInfo>, eluent_git::GitError> {
                Ok(Vec::new())
            }
            fn worktree_prune(&self) -> Result<(), eluent_git::GitError> {
                Ok(())
            }
            fn delete_branch(&self, _name: &str) -> Result<(), eluent_git::GitError> {
                Ok(())
            }
            fn commit_all(&self, _p: &Path, _m: &str) -> Result<Option<GitOid>, eluent_git::GitError> {
                Ok(None)
            }
            fn fetch(&self, _r: &str, _rf: &RefName, _t: Duration) -> Result<(), eluent_git::GitError> {
                Ok(())
            }
            fn fast_forward(&self, _p: &Path, _r: &str, _b: &str) -> Result<(), eluent_git::GitError> {
                Ok(())
            }
            fn push(
                &self,
                _r: &str,
                _l: &RefName,
                _rr: &RefName,
                _t: Duration,
            ) -> Result<eluent_git::PushOutcome, eluent_git::GitError> {
                Ok(eluent_git::PushOutcome::Accepted)
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let eluent_dir = dir.path().join(".eluent");
        std::fs::create_dir_all(&eluent_dir).unwrap();
        let git = NoRemoteGit;
        let sync = Synchronizer::new(&git, &eluent_dir, "origin", "main", Duration::from_secs(30));
        let report = sync.sync().unwrap();
        assert!(!report.merged);
    }
}
