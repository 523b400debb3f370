//! The cross-agent claim protocol: atomically assigning an atom to one
//! agent via commits on a dedicated ledger branch, shared by every clone
//! of a repository on one host through a single worktree and flock.

pub mod ledger;

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use eluent_git::{GitError, GitRepo, PushOutcome, RefName};
use serde::{Deserialize, Serialize};

use crate::config::OfflineMode;
use crate::error::EluentError;
use crate::model::types::AtomId;
use crate::model::{Atom, Status};
use crate::repo::jsonl::{self, Record};
use crate::repo::lock::FileLock;

/// A claim recorded while the ledger branch was unreachable, queued in
/// `.ledger-sync-state` for the next successful sync to reconcile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OfflineClaimRecord {
    /// The atom claimed.
    pub atom_id: String,
    /// The agent that claimed it.
    pub agent_id: String,
    /// When the offline claim was recorded.
    pub claimed_at: DateTime<Utc>,
}

/// Outcome of a successful [`ClaimProtocol::claim`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    /// The claim landed on the remote ledger branch.
    Claimed,
    /// The same agent already held this atom; nothing was pushed.
    AlreadyOwned,
    /// Recorded in the local worktree only, per `offline_mode: local`.
    ClaimedOffline,
}

/// Distinguishes a hard failure (bad state, corrupt ledger) from a
/// network failure, which the `local` offline mode can recover from.
#[derive(Debug)]
enum Failure {
    Local(EluentError),
    Network(GitError),
}

impl From<GitError> for Failure {
    fn from(err: GitError) -> Self {
        Self::Network(err)
    }
}

impl From<std::io::Error> for Failure {
    fn from(err: std::io::Error) -> Self {
        Self::Local(EluentError::Io(err))
    }
}

/// Drives claim, release, and heartbeat against a ledger-branch worktree
/// shared by every clone of a repository on one host.
pub struct ClaimProtocol<'a> {
    git: &'a dyn GitRepo,
    ledger_path: PathBuf,
    lock_path: PathBuf,
    offline_state_path: PathBuf,
    remote: String,
    branch: String,
    network_timeout: Duration,
    claim_retries: u32,
    offline_mode: OfflineMode,
}

impl<'a> ClaimProtocol<'a> {
    /// Build a claim protocol driver.
    ///
    /// `ledger_path` is the ledger branch's worktree checkout (typically
    /// under `~/.eluent/<repo>/.sync-worktree/`), `lock_path` the
    /// cross-process flock guarding it, and `offline_state_path` the
    /// `.ledger-sync-state` file offline claims are queued in.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        git: &'a dyn GitRepo,
        ledger_path: impl Into<PathBuf>,
        lock_path: impl Into<PathBuf>,
        offline_state_path: impl Into<PathBuf>,
        remote: impl Into<String>,
        branch: impl Into<String>,
        network_timeout: Duration,
        claim_retries: u32,
        offline_mode: OfflineMode,
    ) -> Self {
        Self {
            git,
            ledger_path: ledger_path.into(),
            lock_path: lock_path.into(),
            offline_state_path: offline_state_path.into(),
            remote: remote.into(),
            branch: branch.into(),
            network_timeout,
            claim_retries: claim_retries.max(1),
            offline_mode,
        }
    }

    fn data_path(&self) -> PathBuf {
        self.ledger_path.join(".eluent").join("data.jsonl")
    }

    fn branch_ref(&self) -> RefName {
        RefName::branch(&self.branch)
    }

    fn refresh_worktree(&self) -> Result<(), GitError> {
        ledger::ensure_fresh(self.git, &self.ledger_path, &self.branch)?;
        self.git.fetch(&self.remote, &self.branch_ref(), self.network_timeout)?;
        self.git.fast_forward(&self.ledger_path, &self.remote, &self.branch)
    }

    /// Claim `atom_id` for `agent`.
    ///
    /// Idempotent if `agent` already owns the atom. Fails with
    /// [`EluentError::ClaimConflict`] if the atom is terminal or held by a
    /// different agent. If the ledger branch cannot be reached and
    /// `offline_mode` is `local`, the claim is recorded in the worktree
    /// only and queued in `.ledger-sync-state`; with `offline_mode: fail`
    /// the network error is returned directly.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be acquired, the atom does not
    /// exist, the claim conflicts with existing state, or (with
    /// `offline_mode: fail`) the ledger is unreachable.
    pub fn claim(&self, atom_id: &AtomId, agent: &str) -> Result<ClaimOutcome, EluentError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        match self.try_claim_online(atom_id, agent) {
            Ok(outcome) => Ok(outcome),
            Err(Failure::Local(err)) => Err(err),
            Err(Failure::Network(err)) => self.fall_back_offline(atom_id, agent, err),
        }
    }

    fn try_claim_online(&self, atom_id: &AtomId, agent: &str) -> Result<ClaimOutcome, Failure> {
        self.refresh_worktree()?;

        for _ in 0..self.claim_retries {
            let records = jsonl::load(&self.data_path())?.records;
            let atom = find_atom(&records, atom_id)
                .ok_or_else(|| Failure::Local(not_found(atom_id)))?;

            if atom.status.is_terminal() {
                return Err(Failure::Local(terminal_conflict(atom_id)));
            }
            if atom.status == Status::InProgress {
                return if atom.assignee.as_deref() == Some(agent) {
                    Ok(ClaimOutcome::AlreadyOwned)
                } else {
                    Err(Failure::Local(already_claimed(atom_id, atom.assignee.as_deref())))
                };
            }

            let mut updated = atom.clone();
            updated.status = Status::InProgress;
            updated.assignee = Some(agent.to_owned());
            updated.updated_at = Utc::now();

            let message = format!("Claim {atom_id} for {agent}");
            let rewritten = replace_atom(records, &updated);
            jsonl::rewrite(&self.data_path(), &rewritten)?;
            self.git.commit_all(&self.ledger_path, &message)?;

            match self.git.push(&self.remote, &self.branch_ref(), &self.branch_ref(), self.network_timeout)? {
                PushOutcome::Accepted => return Ok(ClaimOutcome::Claimed),
                PushOutcome::Rejected => {
                    self.refresh_worktree()?;
                }
            }
        }

        let records = jsonl::load(&self.data_path())?.records;
        match find_atom(&records, atom_id) {
            Some(atom) if atom.status == Status::InProgress && atom.assignee.as_deref() != Some(agent) => {
                Err(Failure::Local(already_claimed(atom_id, atom.assignee.as_deref())))
            }
            _ => Err(Failure::Local(EluentError::ClaimConflict {
                atom_id: atom_id.to_string(),
                reason: "exhausted push retries against a moving ledger".to_owned(),
            })),
        }
    }

    fn fall_back_offline(
        &self,
        atom_id: &AtomId,
        agent: &str,
        err: GitError,
    ) -> Result<ClaimOutcome, EluentError> {
        match self.offline_mode {
            OfflineMode::Fail => Err(EluentError::Git(err)),
            OfflineMode::Local => {
                let path = self.data_path();
                let records = jsonl::load(&path).unwrap_or_default().records;
                let Some(atom) = find_atom(&records, atom_id) else {
                    return Err(not_found(atom_id));
                };
                if atom.status.is_terminal() {
                    return Err(terminal_conflict(atom_id));
                }
                if atom.status == Status::InProgress && atom.assignee.as_deref() != Some(agent) {
                    return Err(already_claimed(atom_id, atom.assignee.as_deref()));
                }
                let mut updated = atom.clone();
                updated.status = Status::InProgress;
                updated.assignee = Some(agent.to_owned());
                updated.updated_at = Utc::now();
                let rewritten = replace_atom(records, &updated);
                jsonl::rewrite(&path, &rewritten)?;

                append_offline_record(
                    &self.offline_state_path,
                    OfflineClaimRecord {
                        atom_id: atom_id.to_string(),
                        agent_id: agent.to_owned(),
                        claimed_at: Utc::now(),
                    },
                )?;
                tracing::warn!(atom_id = %atom_id, error = %err, "ledger unreachable, claim recorded locally only");
                Ok(ClaimOutcome::ClaimedOffline)
            }
        }
    }

    /// Release `atom_id`, clearing its status and assignee. A no-op if
    /// `agent` does not currently hold the claim.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be acquired or the atom does
    /// not exist. A network failure degrades to a warning: the stale-claim
    /// timeout will eventually release the atom for every other agent too.
    pub fn release(&self, atom_id: &AtomId, agent: &str) -> Result<(), EluentError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        match self.try_release_online(atom_id, agent) {
            Ok(()) => Ok(()),
            Err(Failure::Local(err)) => Err(err),
            Err(Failure::Network(err)) => {
                tracing::warn!(atom_id = %atom_id, error = %err, "release did not reach the ledger; stale-claim reconciliation will clear it eventually");
                Ok(())
            }
        }
    }

    fn try_release_online(&self, atom_id: &AtomId, agent: &str) -> Result<(), Failure> {
        self.refresh_worktree()?;

        for _ in 0..self.claim_retries {
            let records = jsonl::load(&self.data_path())?.records;
            let Some(atom) = find_atom(&records, atom_id) else {
                return Err(Failure::Local(not_found(atom_id)));
            };
            if atom.status != Status::InProgress || atom.assignee.as_deref() != Some(agent) {
                return Ok(());
            }

            let mut updated = atom.clone();
            updated.status = Status::Open;
            updated.assignee = None;
            updated.updated_at = Utc::now();

            let message = format!("Release {atom_id} from {agent}");
            let rewritten = replace_atom(records, &updated);
            jsonl::rewrite(&self.data_path(), &rewritten)?;
            self.git.commit_all(&self.ledger_path, &message)?;

            match self.git.push(&self.remote, &self.branch_ref(), &self.branch_ref(), self.network_timeout)? {
                PushOutcome::Accepted => return Ok(()),
                PushOutcome::Rejected => self.refresh_worktree()?,
            }
        }
        Ok(())
    }

    /// Touch `atom_id`'s `updated_at` without changing its state, so it
    /// survives the stale-claim timeout for another cycle. Best-effort:
    /// any failure is logged and swallowed, since the next heartbeat will
    /// simply try again.
    pub fn heartbeat(&self, atom_id: &AtomId, agent: &str) {
        let Ok(_lock) = FileLock::acquire(&self.lock_path) else {
            return;
        };
        if let Err(err) = self.try_heartbeat_online(atom_id, agent) {
            tracing::warn!(atom_id = %atom_id, error = ?err, "heartbeat did not reach the ledger this cycle");
        }
    }

    fn try_heartbeat_online(&self, atom_id: &AtomId, agent: &str) -> Result<(), Failure> {
        self.refresh_worktree()?;

        for _ in 0..self.claim_retries {
            let records = jsonl::load(&self.data_path())?.records;
            let Some(atom) = find_atom(&records, atom_id) else {
                return Ok(());
            };
            if atom.status != Status::InProgress || atom.assignee.as_deref() != Some(agent) {
                return Ok(());
            }
            let mut updated = atom.clone();
            updated.updated_at = Utc::now();
            let rewritten = replace_atom(records, &updated);
            jsonl::rewrite(&self.data_path(), &rewritten)?;
            self.git.commit_all(&self.ledger_path, &format!("Heartbeat {atom_id}"))?;

            match self.git.push(&self.remote, &self.branch_ref(), &self.branch_ref(), self.network_timeout)? {
                PushOutcome::Accepted => return Ok(()),
                PushOutcome::Rejected => self.refresh_worktree()?,
            }
        }
        Ok(())
    }

    /// Release every atom that has been `in_progress` for longer than
    /// `timeout_hours`, returning the IDs released.
    ///
    /// A failed push is logged and swallowed, not returned: the release
    /// already landed in the local ledger worktree, and the next sync or
    /// stale-claim sweep will carry it to the remote. This matches
    /// [`Self::release`]'s eventual-consistency treatment of push failures.
    ///
    /// # Errors
    /// Returns an error if the lock cannot be acquired or the ledger
    /// cannot be read or committed.
    pub fn release_stale(
        &self,
        timeout_hours: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<AtomId>, EluentError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        self.refresh_worktree()?;

        let records = jsonl::load(&self.data_path())?.records;
        let threshold = chrono::Duration::hours(i64::from(timeout_hours));
        let mut released = Vec::new();
        let mut new_records = Vec::with_capacity(records.len());
        for record in records {
            match record {
                Record::Atom(mut atom)
                    if atom.status == Status::InProgress && now - atom.updated_at >= threshold =>
                {
                    atom.status = Status::Open;
                    atom.assignee = None;
                    atom.updated_at = now;
                    released.push(atom.id.clone());
                    new_records.push(Record::Atom(atom));
                }
                other => new_records.push(other),
            }
        }
        if released.is_empty() {
            return Ok(released);
        }
        jsonl::rewrite(&self.data_path(), &new_records)?;
        if self.git.commit_all(&self.ledger_path, "Release stale claims")?.is_some() {
            if let Err(err) = self.git.push(&self.remote, &self.branch_ref(), &self.branch_ref(), self.network_timeout) {
                tracing::warn!(error = %err, "release_stale did not reach the ledger; stale-claim reconciliation will retry next sweep");
            }
        }
        Ok(released)
    }

    /// Replay every claim queued in `.ledger-sync-state` against the
    /// ledger branch now that it's reachable, leaving behind only the
    /// ones that still can't be applied (the atom is now terminal, or
    /// another agent has since claimed it for real).
    ///
    /// # Errors
    /// Returns an error if the lock cannot be acquired or the queue file
    /// cannot be read or rewritten.
    pub fn reconcile_offline_claims(&self) -> Result<Vec<AtomId>, EluentError> {
        let _lock = FileLock::acquire(&self.lock_path)?;
        let queued = load_offline_records(&self.offline_state_path);
        if queued.is_empty() {
            return Ok(Vec::new());
        }

        let mut reconciled = Vec::new();
        let mut still_pending = Vec::new();
        for record in queued {
            let Ok(atom_id) = record.atom_id.parse::<AtomId>() else {
                continue;
            };
            match self.try_claim_online(&atom_id, &record.agent_id) {
                Ok(_) => reconciled.push(atom_id),
                Err(Failure::Local(err)) => {
                    tracing::warn!(
                        atom_id = %atom_id,
                        agent = %record.agent_id,
                        error = %err,
                        "dropping offline claim that no longer applies"
                    );
                }
                Err(Failure::Network(_)) => still_pending.push(record),
            }
        }

        write_offline_records(&self.offline_state_path, &still_pending)?;
        Ok(reconciled)
    }
}

fn not_found(atom_id: &AtomId) -> EluentError {
    EluentError::AtomNotFound { id: atom_id.to_string() }
}

fn terminal_conflict(atom_id: &AtomId) -> EluentError {
    EluentError::ClaimConflict {
        atom_id: atom_id.to_string(),
        reason: "atom is closed or discarded".to_owned(),
    }
}

fn already_claimed(atom_id: &AtomId, owner: Option<&str>) -> EluentError {
    EluentError::ClaimConflict {
        atom_id: atom_id.to_string(),
        reason: format!("already claimed by {}", owner.unwrap_or("unknown agent")),
    }
}

fn find_atom<'r>(records: &'r [Record], id: &AtomId) -> Option<&'r Atom> {
    records.iter().find_map(|r| match r {
        Record::Atom(a) if &a.id == id => Some(a),
        _ => None,
    })
}

fn replace_atom(records: Vec<Record>, updated: &Atom) -> Vec<Record> {
    records
        .into_iter()
        .map(|r| match r {
            Record::Atom(a) if a.id == updated.id => Record::Atom(updated.clone()),
            other => other,
        })
        .collect()
}

fn load_offline_records(path: &std::path::Path) -> Vec<OfflineClaimRecord> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn append_offline_record(path: &std::path::Path, record: OfflineClaimRecord) -> std::io::Result<()> {
    let mut records = load_offline_records(path);
    records.push(record);
    write_offline_records(path, &records)
}

fn write_offline_records(path: &std::path::Path, records: &[OfflineClaimRecord]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let text = serde_json::to_string_pretty(records)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, text)
}
