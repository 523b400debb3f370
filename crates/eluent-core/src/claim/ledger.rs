//! The claim ledger worktree: staleness detection and refresh for the
//! auxiliary checkout of the ledger branch every claim operation reads
//! and writes through.
//!
//! The worktree lives under `~/.eluent/<repo>/.sync-worktree/` (or
//! `$XDG_DATA_HOME/eluent/<repo>/.sync-worktree/`) and is bound to the main
//! repository via git's own worktree mechanism, so every clone of the same
//! repository on one host shares it.

use std::path::Path;

use eluent_git::{GitError, GitRepo};

/// Whether the worktree at `path` needs to be torn down and recreated
/// before use: missing entirely, detached, or checked out to the wrong
/// branch.
#[must_use]
pub fn is_stale(git: &dyn GitRepo, path: &Path, branch: &str) -> bool {
    if !path.join(".git").exists() {
        return true;
    }
    match git.current_branch(path) {
        Ok(Some(current)) => current != branch,
        _ => true,
    }
}

/// Ensure the ledger worktree at `path` exists, is checked out to
/// `branch`, and is not stale — removing and re-adding it if necessary.
///
/// # Errors
/// Propagates any git error from the remove/prune/add sequence.
pub fn ensure_fresh(git: &dyn GitRepo, path: &Path, branch: &str) -> Result<(), GitError> {
    if is_stale(git, path, branch) {
        if path.exists() {
            let _ = git.worktree_remove(path, true);
            git.worktree_prune()?;
        }
        git.worktree_add(path, branch, None)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::time::Duration;

    use eluent_git::{PushOutcome, RefName};

    use super::*;

    struct FakeGit {
        current_branch: Option<String>,
        add_calls: std::cell::RefCell<Vec<PathBuf>>,
    }

    impl GitRepo for FakeGit {
        fn rev_parse(&self, _spec: &str) -> Result<Option<eluent_git::GitOid>, GitError> {
            Ok(None)
        }
        fn is_ancestor(
            &self,
            _a: &eluent_git::GitOid,
            _b: &eluent_git::GitOid,
        ) -> Result<bool, GitError> {
            Ok(false)
        }
        fn current_branch(&self, _path: &Path) -> Result<Option<String>, GitError> {
            Ok(self.current_branch.clone())
        }
        fn worktree_add(
            &self,
            path: &Path,
            _branch: &str,
            _start_point: Option<&str>,
        ) -> Result<(), GitError> {
            self.add_calls.borrow_mut().push(path.to_owned());
            Ok(())
        }
        fn worktree_remove(&self, _path: &Path, _force: bool) -> Result<(), GitError> {
            Ok(())
        }
        fn worktree_list(&self) -> Result<Vec<eluent_git::WorktreeInfo>, GitError> {
            Ok(Vec::new())
        }
        fn worktree_prune(&self) -> Result<(), GitError> {
            Ok(())
        }
        fn delete_branch(&self, _name: &str) -> Result<(), GitError> {
            Ok(())
        }
        fn commit_all(
            &self,
            _path: &Path,
            _message: &str,
        ) -> Result<Option<eluent_git::GitOid>, GitError> {
            Ok(None)
        }
        fn fetch(&self, _remote: &str, _refname: &RefName, _timeout: Duration) -> Result<(), GitError> {
            Ok(())
        }
        fn fast_forward(&self, _path: &Path, _remote: &str, _branch: &str) -> Result<(), GitError> {
            Ok(())
        }
        fn push(
            &self,
            _remote: &str,
            _local_ref: &RefName,
            _remote_ref: &RefName,
            _timeout: Duration,
        ) -> Result<PushOutcome, GitError> {
            Ok(PushOutcome::Accepted)
        }
    }

    #[test]
    fn missing_directory_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nonexistent");
        let git = FakeGit {
            current_branch: Some("eluent-ledger".to_owned()),
            add_calls: std::cell::RefCell::new(Vec::new()),
        };
        assert!(is_stale(&git, &path, "eluent-ledger"));
    }

    #[test]
    fn wrong_branch_is_stale() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let git = FakeGit {
            current_branch: Some("main".to_owned()),
            add_calls: std::cell::RefCell::new(Vec::new()),
        };
        assert!(is_stale(&git, dir.path(), "eluent-ledger"));
    }

    #[test]
    fn matching_branch_is_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".git")).unwrap();
        let git = FakeGit {
            current_branch: Some("eluent-ledger".to_owned()),
            add_calls: std::cell::RefCell::new(Vec::new()),
        };
        assert!(!is_stale(&git, dir.path(), "eluent-ledger"));
    }

    #[test]
    fn ensure_fresh_reclones_a_stale_worktree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger-wt");
        let git = FakeGit {
            current_branch: Some("main".to_owned()),
            add_calls: std::cell::RefCell::new(Vec::new()),
        };
        ensure_fresh(&git, &path, "eluent-ledger").unwrap();
        assert_eq!(git.add_calls.borrow().len(), 1);
    }
}
