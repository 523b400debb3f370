//! Integration tests against a real, throwaway git repository — no mocked
//! git. Exercises the porcelain surface [`GixGitRepo`] wraps: rev-parse,
//! worktree add/remove/list, commit, and local fetch/push against a bare
//! remote.

use std::path::Path;
use std::process::Command;
use std::time::Duration;

use eluent_git::{GitRepo, GixGitRepo, PushOutcome, RefName};
use tempfile::TempDir;

fn git(dir: &Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo() -> TempDir {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "--initial-branch=main"]);
    git(dir.path(), &["config", "user.email", "test@example.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    std::fs::write(dir.path().join("README.md"), "hello\n").unwrap();
    git(dir.path(), &["add", "-A"]);
    git(dir.path(), &["commit", "-m", "initial commit"]);
    dir
}

#[test]
fn rev_parse_resolves_head_and_reports_missing() {
    let dir = init_repo();
    let repo = GixGitRepo::open(dir.path()).unwrap();

    let head = repo.rev_parse("HEAD").unwrap();
    assert!(head.is_some());

    let missing = repo.rev_parse("refs/heads/does-not-exist").unwrap();
    assert!(missing.is_none());
}

#[test]
fn worktree_add_list_remove_round_trips() {
    let dir = init_repo();
    let repo = GixGitRepo::open(dir.path()).unwrap();
    let wt_dir = TempDir::new().unwrap();
    let wt_path = wt_dir.path().join("ledger");

    repo.worktree_add(&wt_path, "eluent-ledger", Some("HEAD"))
        .unwrap();
    assert!(wt_path.join(".git").exists());

    let branch = repo.current_branch(&wt_path).unwrap();
    assert_eq!(branch.as_deref(), Some("eluent-ledger"));

    let list = repo.worktree_list().unwrap();
    assert!(list.iter().any(|w| w.path == wt_path));

    repo.worktree_remove(&wt_path, false).unwrap();
    let list = repo.worktree_list().unwrap();
    assert!(!list.iter().any(|w| w.path == wt_path));
}

#[test]
fn worktree_add_reuses_existing_branch() {
    let dir = init_repo();
    let repo = GixGitRepo::open(dir.path()).unwrap();
    git(dir.path(), &["branch", "eluent-ledger"]);

    let wt_dir = TempDir::new().unwrap();
    let wt_path = wt_dir.path().join("ledger");
    repo.worktree_add(&wt_path, "eluent-ledger", None).unwrap();

    let branch = repo.current_branch(&wt_path).unwrap();
    assert_eq!(branch.as_deref(), Some("eluent-ledger"));
}

#[test]
fn commit_all_stages_and_commits_new_files() {
    let dir = init_repo();
    let repo = GixGitRepo::open(dir.path()).unwrap();

    let before = repo.rev_parse("HEAD").unwrap().unwrap();
    std::fs::write(dir.path().join("data.jsonl"), "{}\n").unwrap();
    let oid = repo.commit_all(dir.path(), "add data").unwrap();
    assert!(oid.is_some());
    assert_ne!(oid.unwrap(), before);
}

#[test]
fn commit_all_returns_none_when_nothing_changed() {
    let dir = init_repo();
    let repo = GixGitRepo::open(dir.path()).unwrap();
    let oid = repo.commit_all(dir.path(), "no-op").unwrap();
    assert!(oid.is_none());
}

#[test]
fn fetch_and_push_round_trip_through_a_bare_remote() {
    let remote_dir = TempDir::new().unwrap();
    git(remote_dir.path(), &["init", "--bare", "--initial-branch=main"]);

    let clone_a = init_repo();
    git(
        clone_a.path(),
        &["remote", "add", "origin", remote_dir.path().to_str().unwrap()],
    );
    let repo_a = GixGitRepo::open(clone_a.path()).unwrap();
    let main_ref = RefName::branch("main");
    let outcome = repo_a
        .push("origin", &main_ref, &main_ref, Duration::from_secs(10))
        .unwrap();
    assert_eq!(outcome, PushOutcome::Accepted);

    let clone_b = TempDir::new().unwrap();
    git(
        clone_b.path(),
        &["clone", remote_dir.path().to_str().unwrap(), "."],
    );
    git(clone_b.path(), &["config", "user.email", "b@example.com"]);
    git(clone_b.path(), &["config", "user.name", "B"]);
    std::fs::write(clone_b.path().join("from_b.txt"), "b\n").unwrap();
    git(clone_b.path(), &["add", "-A"]);
    git(clone_b.path(), &["commit", "-m", "from b"]);
    let repo_b = GixGitRepo::open(clone_b.path()).unwrap();
    let outcome = repo_b
        .push("origin", &main_ref, &main_ref, Duration::from_secs(10))
        .unwrap();
    assert_eq!(outcome, PushOutcome::Accepted);

    // clone_a is now behind; pushing again without fetching should be rejected.
    std::fs::write(clone_a.path().join("from_a.txt"), "a\n").unwrap();
    git(clone_a.path(), &["add", "-A"]);
    git(clone_a.path(), &["commit", "-m", "from a, stale"]);
    let outcome = repo_a
        .push("origin", &main_ref, &main_ref, Duration::from_secs(10))
        .unwrap();
    assert_eq!(outcome, PushOutcome::Rejected);

    repo_a.fetch("origin", &main_ref, Duration::from_secs(10)).unwrap();
    let remote_head = repo_a.rev_parse("refs/remotes/origin/main").unwrap();
    assert!(remote_head.is_some());
}

#[test]
fn is_ancestor_detects_linear_history() {
    let dir = init_repo();
    let repo = GixGitRepo::open(dir.path()).unwrap();
    let first = repo.rev_parse("HEAD").unwrap().unwrap();
    std::fs::write(dir.path().join("second.txt"), "x\n").unwrap();
    let second = repo.commit_all(dir.path(), "second").unwrap().unwrap();

    assert!(repo.is_ancestor(&first, &second).unwrap());
    assert!(!repo.is_ancestor(&second, &first).unwrap());
}
