//! Integration tests against real filesystem and git state — no mocked
//! [`eluent_git::GitRepo`]. Exercises the repository, graph, sync, and
//! claim surfaces end to end through a [`tempfile::TempDir`]-backed
//! fixture repository.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use chrono::Utc;
use eluent_core::config::OfflineMode;
use eluent_core::error::EluentError;
use eluent_core::model::types::{AtomId, RepoName};
use eluent_core::model::{Atom, Bond, DependencyType, IssueType, Status};
use eluent_core::repo::{FileClass, Repository};
use eluent_core::sync::Synchronizer;
use eluent_core::{ClaimOutcome, ClaimProtocol};
use eluent_git::{GitRepo as _, GixGitRepo, RefName};
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed in {}", dir.display());
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "--initial-branch=main"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    dir
}

fn commit_eluent_dir(dir: &Path, message: &str) {
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", message]);
}

fn repo_name() -> RepoName {
    RepoName::sanitize("proj").unwrap()
}

fn make_atom(title: &str) -> Atom {
    Atom::new(AtomId::generate(repo_name()), title, IssueType::Task, Utc::now()).unwrap()
}

#[test]
fn repository_round_trips_atoms_bonds_and_comments_across_a_reload() {
    let dir = init_repo();
    let eluent_dir = dir.path().join(".eluent");
    let mut repo = Repository::open(&eluent_dir, repo_name()).unwrap();

    let parent = make_atom("build the thing");
    let child = make_atom("write the tests");
    repo.create_atom(parent.clone(), FileClass::Primary).unwrap();
    repo.create_atom(child.clone(), FileClass::Primary).unwrap();

    let bond = Bond::new(child.id.clone(), parent.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
    repo.add_bond(bond).unwrap();
    repo.add_comment(parent.id.clone(), "alice", "looks good").unwrap();

    let mut reloaded = Repository::open(&eluent_dir, repo_name()).unwrap();
    reloaded.reload().unwrap();
    assert_eq!(reloaded.index().find_by_id(&parent.id), Some(&parent));
    assert_eq!(reloaded.index().bonds_from(&child.id).len(), 1);
    assert_eq!(reloaded.index().comments_for(&parent.id).len(), 1);
}

#[test]
fn add_bond_rejects_a_cycle_through_the_repository_boundary_not_just_the_cli() {
    let dir = init_repo();
    let eluent_dir = dir.path().join(".eluent");
    let mut repo = Repository::open(&eluent_dir, repo_name()).unwrap();

    let a = make_atom("a");
    let b = make_atom("b");
    let c = make_atom("c");
    for atom in [&a, &b, &c] {
        repo.create_atom(atom.clone(), FileClass::Primary).unwrap();
    }
    repo.add_bond(Bond::new(a.id.clone(), b.id.clone(), DependencyType::Blocks, Utc::now()).unwrap()).unwrap();
    repo.add_bond(Bond::new(b.id.clone(), c.id.clone(), DependencyType::Blocks, Utc::now()).unwrap()).unwrap();

    let closing = Bond::new(c.id.clone(), a.id.clone(), DependencyType::Blocks, Utc::now()).unwrap();
    let err = repo.add_bond(closing).unwrap_err();
    assert!(matches!(err, EluentError::BondCycle { .. }));
    // The would-be cycle never reached the on-disk file.
    assert_eq!(repo.index().bonds_from(&c.id).len(), 0);
}

#[test]
fn sync_merges_divergent_clones_through_a_bare_remote() {
    let remote_dir = TempDir::new().unwrap();
    git(remote_dir.path(), &["init", "--bare", "--initial-branch=main"]);
    let remote_url = remote_dir.path().to_str().unwrap().to_owned();

    let clone_a = init_repo();
    std::fs::create_dir_all(clone_a.path().join(".eluent")).unwrap();
    let shared = make_atom("shared work");
    {
        let mut repo = Repository::open(&clone_a.path().join(".eluent"), repo_name()).unwrap();
        repo.create_atom(shared.clone(), FileClass::Primary).unwrap();
    }
    commit_eluent_dir(clone_a.path(), "initial atom");
    git(clone_a.path(), &["remote", "add", "origin", &remote_url]);
    let main_ref = RefName::branch("main");
    let git_a = GixGitRepo::open(clone_a.path()).unwrap();
    git_a.push("origin", &main_ref, &main_ref, Duration::from_secs(10)).unwrap();

    let clone_b = TempDir::new().unwrap();
    git(clone_b.path(), &["clone", &remote_url, "."]);
    git(clone_b.path(), &["config", "user.email", "b@example.com"]);
    git(clone_b.path(), &["config", "user.name", "B"]);

    // Remote (clone_b) adds a new atom and pushes.
    let remote_only = make_atom("added remotely");
    {
        let mut repo = Repository::open(&clone_b.path().join(".eluent"), repo_name()).unwrap();
        repo.reload().unwrap();
        repo.create_atom(remote_only.clone(), FileClass::Primary).unwrap();
    }
    commit_eluent_dir(clone_b.path(), "remote atom");
    let git_b = GixGitRepo::open(clone_b.path()).unwrap();
    git_b.push("origin", &main_ref, &main_ref, Duration::from_secs(10)).unwrap();

    // Local (clone_a) independently edits the shared atom, without having
    // seen clone_b's push yet.
    {
        let mut repo = Repository::open(&clone_a.path().join(".eluent"), repo_name()).unwrap();
        repo.reload().unwrap();
        let mut updated = shared.clone();
        updated.title = "shared work (renamed locally)".to_owned();
        updated.updated_at = Utc::now() + chrono::Duration::seconds(1);
        repo.create_atom(updated, FileClass::Primary).unwrap();
    }
    commit_eluent_dir(clone_a.path(), "local rename");

    let synchronizer = Synchronizer::new(
        &git_a,
        clone_a.path().join(".eluent"),
        "origin",
        "main",
        Duration::from_secs(10),
    );
    let report = synchronizer.sync().unwrap();
    assert!(report.merged);
    assert!(report.rejected_bonds.is_empty());

    let mut repo = Repository::open(&clone_a.path().join(".eluent"), repo_name()).unwrap();
    repo.reload().unwrap();
    assert!(repo.index().find_by_id(&remote_only.id).is_some());
    let merged_shared = repo.index().find_by_id(&shared.id).unwrap();
    assert_eq!(merged_shared.title, "shared work (renamed locally)");
}

#[test]
fn claim_protocol_claims_an_atom_over_a_real_ledger_branch() {
    let remote_dir = TempDir::new().unwrap();
    git(remote_dir.path(), &["init", "--bare", "--initial-branch=main"]);
    let remote_url = remote_dir.path().to_str().unwrap().to_owned();

    let main_repo = init_repo();
    std::fs::create_dir_all(main_repo.path().join(".eluent")).unwrap();
    let atom = make_atom("claim me");
    {
        let mut repo = Repository::open(&main_repo.path().join(".eluent"), repo_name()).unwrap();
        repo.create_atom(atom.clone(), FileClass::Primary).unwrap();
    }
    commit_eluent_dir(main_repo.path(), "seed atom");
    git(main_repo.path(), &["branch", "eluent-ledger"]);
    git(main_repo.path(), &["remote", "add", "origin", &remote_url]);
    git(main_repo.path(), &["push", "origin", "main", "eluent-ledger"]);

    let git_repo = GixGitRepo::open(main_repo.path()).unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let protocol = ClaimProtocol::new(
        &git_repo,
        ledger_dir.path().join("ledger"),
        ledger_dir.path().join(".lock"),
        ledger_dir.path().join(".sync-state"),
        "origin",
        "eluent-ledger",
        Duration::from_secs(10),
        3,
        OfflineMode::Fail,
    );

    let outcome = protocol.claim(&atom.id, "alice").unwrap();
    assert_eq!(outcome, ClaimOutcome::Claimed);

    // Re-claiming as the same agent is idempotent.
    let outcome = protocol.claim(&atom.id, "alice").unwrap();
    assert_eq!(outcome, ClaimOutcome::AlreadyOwned);

    // A different agent cannot claim an atom already held.
    let err = protocol.claim(&atom.id, "bob").unwrap_err();
    assert!(matches!(err, EluentError::ClaimConflict { .. }));

    protocol.release(&atom.id, "alice").unwrap();
    let outcome = protocol.claim(&atom.id, "bob").unwrap();
    assert_eq!(outcome, ClaimOutcome::Claimed);

    // The commits landed on the ledger branch in the bare remote, not on main.
    let ledger_tip = Command::new("git")
        .args(["show", "refs/heads/eluent-ledger:.eluent/data.jsonl"])
        .current_dir(remote_dir.path())
        .output()
        .unwrap();
    assert!(ledger_tip.status.success());
    let text = String::from_utf8_lossy(&ledger_tip.stdout);
    assert!(text.contains("\"status\":\"in_progress\""));
    assert!(text.contains("\"assignee\":\"bob\""));
}

#[test]
fn claim_protocol_records_offline_when_the_remote_is_unreachable() {
    let main_repo = init_repo();
    std::fs::create_dir_all(main_repo.path().join(".eluent")).unwrap();
    let atom = make_atom("claim me offline");
    {
        let mut repo = Repository::open(&main_repo.path().join(".eluent"), repo_name()).unwrap();
        repo.create_atom(atom.clone(), FileClass::Primary).unwrap();
    }
    commit_eluent_dir(main_repo.path(), "seed atom");
    git(main_repo.path(), &["branch", "eluent-ledger"]);
    // No remote configured at all: fetch will fail, exercising the
    // offline fallback path.
    let git_repo = GixGitRepo::open(main_repo.path()).unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let protocol = ClaimProtocol::new(
        &git_repo,
        ledger_dir.path().join("ledger"),
        ledger_dir.path().join(".lock"),
        ledger_dir.path().join(".sync-state"),
        "origin",
        "eluent-ledger",
        Duration::from_secs(5),
        1,
        OfflineMode::Local,
    );

    let outcome = protocol.claim(&atom.id, "alice").unwrap();
    assert_eq!(outcome, ClaimOutcome::ClaimedOffline);
    assert!(ledger_dir.path().join(".sync-state").exists());
}

#[test]
fn status_cannot_be_set_to_in_progress_on_a_terminal_atom_via_claim() {
    let main_repo = init_repo();
    std::fs::create_dir_all(main_repo.path().join(".eluent")).unwrap();
    let mut atom = make_atom("already done");
    atom.status = Status::Closed;
    {
        let mut repo = Repository::open(&main_repo.path().join(".eluent"), repo_name()).unwrap();
        repo.create_atom(atom.clone(), FileClass::Primary).unwrap();
    }
    commit_eluent_dir(main_repo.path(), "seed closed atom");
    git(main_repo.path(), &["branch", "eluent-ledger"]);

    let git_repo = GixGitRepo::open(main_repo.path()).unwrap();
    let ledger_dir = TempDir::new().unwrap();
    let protocol = ClaimProtocol::new(
        &git_repo,
        ledger_dir.path().join("ledger"),
        ledger_dir.path().join(".lock"),
        ledger_dir.path().join(".sync-state"),
        "origin",
        "eluent-ledger",
        Duration::from_secs(5),
        1,
        OfflineMode::Local,
    );

    // No remote at all, so this exercises the offline path, which also
    // enforces the terminal-status check before recording a claim.
    let err = protocol.claim(&atom.id, "alice").unwrap_err();
    assert!(matches!(err, EluentError::ClaimConflict { .. }));
}
