//! [`GitRepo`] implementation backed by [gix](https://github.com/GitoxideLabs/gitoxide).
//!
//! Everything except fetch and push — rev-parse, ancestry, commit creation,
//! tree/object writes, and worktree lifecycle management — goes through
//! gix in-process. Fetch and push alone shell out to the `git` binary; see
//! [`crate::network`] for why.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::instrument;

use crate::error::GitError;
use crate::repo::GitRepo;
use crate::types::{GitOid, PushOutcome, RefName, WorktreeInfo};
use crate::{network, objects, refs, worktree};

fn backend(message: impl Into<String>) -> GitError {
    GitError::Backend { message: message.into() }
}

/// A [`GitRepo`] bound to the repository rooted at `root`.
pub struct GixGitRepo {
    repo: gix::Repository,
    root: PathBuf,
}

impl GixGitRepo {
    /// Open the git repository at `root`.
    ///
    /// # Errors
    /// Returns an error if `root` is not inside a git working tree.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, GitError> {
        let root = root.into();
        let repo = gix::open(&root).map_err(|e| backend(format!("failed to open {}: {e}", root.display())))?;
        Ok(Self { repo, root })
    }

    /// The repository root this instance operates against.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl GitRepo for GixGitRepo {
    #[instrument(skip(self))]
    fn rev_parse(&self, spec: &str) -> Result<Option<GitOid>, GitError> {
        refs::rev_parse(&self.repo, spec)
    }

    #[instrument(skip(self))]
    fn is_ancestor(&self, ancestor: &GitOid, descendant: &GitOid) -> Result<bool, GitError> {
        refs::is_ancestor(&self.repo, ancestor, descendant)
    }

    #[instrument(skip(self))]
    fn current_branch(&self, worktree_path: &Path) -> Result<Option<String>, GitError> {
        refs::current_branch(worktree_path)
    }

    #[instrument(skip(self))]
    fn worktree_add(&self, path: &Path, branch: &str, start_point: Option<&str>) -> Result<(), GitError> {
        worktree::worktree_add(&self.repo, path, branch, start_point)
    }

    #[instrument(skip(self))]
    fn worktree_remove(&self, path: &Path, force: bool) -> Result<(), GitError> {
        worktree::worktree_remove(&self.repo, path, force)
    }

    #[instrument(skip(self))]
    fn worktree_list(&self) -> Result<Vec<WorktreeInfo>, GitError> {
        worktree::worktree_list(&self.repo)
    }

    #[instrument(skip(self))]
    fn worktree_prune(&self) -> Result<(), GitError> {
        worktree::worktree_prune(&self.repo)
    }

    #[instrument(skip(self))]
    fn delete_branch(&self, name: &str) -> Result<(), GitError> {
        refs::delete_branch(&self.repo, name)
    }

    #[instrument(skip(self))]
    fn commit_all(&self, worktree_path: &Path, message: &str) -> Result<Option<GitOid>, GitError> {
        let wt_repo = gix::open(worktree_path)
            .map_err(|e| backend(format!("failed to open {}: {e}", worktree_path.display())))?;

        let new_tree = objects::write_dir_as_tree(&wt_repo, worktree_path)?;
        let head_commit = wt_repo.head_commit().ok();
        let head_tree = head_commit
            .as_ref()
            .map(|c| c.tree_id().map(|id| id.detach()))
            .transpose()
            .map_err(|e| backend(format!("failed to read HEAD tree: {e}")))?;

        if head_tree == Some(new_tree) {
            return Ok(None);
        }

        let update_ref = match wt_repo.head().map_err(|e| backend(format!("failed to read HEAD: {e}")))?.kind {
            gix::head::Kind::Symbolic(r) => r.name.as_bstr().to_string(),
            gix::head::Kind::Unborn(target) => target.to_string(),
            gix::head::Kind::Detached { .. } => {
                return Err(GitError::WorktreeError {
                    name: worktree_path.display().to_string(),
                    detail: "cannot commit_all with a detached HEAD".to_owned(),
                })
            }
        };
        let parents: Vec<gix::ObjectId> = head_commit.map(|c| c.id).into_iter().collect();

        let new_commit = objects::create_commit(&wt_repo, new_tree, &parents, message, &update_ref)?;
        objects::rebuild_index(&wt_repo, new_tree)?;
        Ok(Some(objects::from_gix_oid(new_commit)))
    }

    #[instrument(skip(self))]
    fn fetch(&self, remote: &str, refname: &RefName, timeout: Duration) -> Result<(), GitError> {
        network::fetch(&self.root, remote, refname, timeout)
    }

    #[instrument(skip(self))]
    fn fast_forward(&self, worktree_path: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        let wt_repo = gix::open(worktree_path)
            .map_err(|e| backend(format!("failed to open {}: {e}", worktree_path.display())))?;

        let tracking_ref = format!("refs/remotes/{remote}/{branch}");
        let target = wt_repo
            .try_find_reference(tracking_ref.as_str())
            .map_err(|e| backend(format!("failed to look up {tracking_ref}: {e}")))?
            .ok_or_else(|| GitError::NotFound { message: format!("remote-tracking ref {tracking_ref}") })?
            .peel_to_id_in_place()
            .map_err(|e| backend(format!("failed to peel {tracking_ref}: {e}")))?
            .detach();

        let local_ref = format!("refs/heads/{branch}");
        let current = wt_repo
            .try_find_reference(local_ref.as_str())
            .map_err(|e| backend(format!("failed to look up {local_ref}: {e}")))?
            .and_then(|mut r| r.peel_to_id_in_place().ok().map(|id| id.detach()));

        if current == Some(target) {
            return Ok(());
        }
        if let Some(current) = current {
            if !refs::is_ancestor(
                &wt_repo,
                &objects::from_gix_oid(current),
                &objects::from_gix_oid(target),
            )? {
                return Err(GitError::NonFastForward { remote: remote.to_owned(), remote_ref: tracking_ref });
            }
        }

        if let Some(current) = current {
            let current_tree = wt_repo
                .find_commit(current)
                .map_err(|e| backend(format!("failed to find commit {current}: {e}")))?
                .tree_id()
                .map_err(|e| backend(format!("failed to read tree of {current}: {e}")))?
                .detach();
            if !objects::working_tree_matches_tree(&wt_repo, current_tree, worktree_path)? {
                return Err(GitError::WorktreeError {
                    name: worktree_path.display().to_string(),
                    detail: "worktree has uncommitted changes".to_owned(),
                });
            }
        }

        let commit = wt_repo
            .find_commit(target)
            .map_err(|e| backend(format!("failed to find commit {target}: {e}")))?;
        let tree_id = commit
            .tree_id()
            .map_err(|e| backend(format!("failed to read tree of {target}: {e}")))?
            .detach();
        objects::checkout_tree_to_dir(&wt_repo, tree_id, worktree_path)?;
        objects::rebuild_index(&wt_repo, tree_id)?;
        wt_repo
            .reference(
                local_ref.as_str(),
                target,
                gix::refs::transaction::PreviousValue::Any,
                "fast-forward",
            )
            .map_err(|e| backend(format!("failed to update {local_ref}: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self))]
    fn push(
        &self,
        remote: &str,
        local_ref: &RefName,
        remote_ref: &RefName,
        timeout: Duration,
    ) -> Result<PushOutcome, GitError> {
        network::push(&self.root, remote, local_ref, remote_ref, timeout)
    }
}
