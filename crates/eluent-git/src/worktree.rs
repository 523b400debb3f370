//! Worktree add/remove/list/prune, built from the documented on-disk
//! worktree layout (`$GIT_DIR/worktrees/<name>/{gitdir,HEAD,commondir,index}`
//! plus a `.git` pointer file in the worktree itself).
//!
//! gix has no high-level worktree lifecycle API, so this is assembled from
//! primitives the same way the plain `git` CLI does it internally.

use std::path::{Path, PathBuf};

use crate::error::GitError;
use crate::objects::{checkout_tree_to_dir, rebuild_index, working_tree_matches_tree};
use crate::types::{GitOid, RefName, WorktreeInfo};

fn backend(message: impl Into<String>) -> GitError {
    GitError::Backend { message: message.into() }
}

fn admin_dir_for(git_dir: &Path, name: &str) -> PathBuf {
    git_dir.join("worktrees").join(name)
}

fn sanitized_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "worktree".to_owned())
}

pub fn worktree_add(
    repo: &gix::Repository,
    path: &Path,
    branch: &str,
    start_point: Option<&str>,
) -> Result<(), GitError> {
    let branch_ref = format!("refs/heads/{branch}");
    let target = match repo.try_find_reference(branch_ref.as_str()) {
        Ok(Some(mut existing)) => existing
            .peel_to_id_in_place()
            .map_err(|e| backend(format!("failed to peel {branch_ref}: {e}")))?
            .detach(),
        Ok(None) => {
            let spec = start_point.unwrap_or("HEAD");
            let id = repo
                .rev_parse_single(spec)
                .map_err(|e| backend(format!("failed to resolve start point {spec}: {e}")))?
                .detach();
            repo.reference(
                branch_ref.as_str(),
                id,
                gix::refs::transaction::PreviousValue::MustNotExist,
                "worktree add: branch created",
            )
            .map_err(|e| backend(format!("failed to create branch {branch}: {e}")))?;
            id
        }
        Err(e) => return Err(backend(format!("failed to look up {branch_ref}: {e}"))),
    };

    let git_dir = repo.git_dir();
    let name = sanitized_name(path);
    let admin = admin_dir_for(git_dir, &name);
    std::fs::create_dir_all(&admin).map_err(GitError::Io)?;
    std::fs::write(admin.join("commondir"), "../..\n").map_err(GitError::Io)?;
    std::fs::write(admin.join("gitdir"), format!("{}\n", path.join(".git").display()))
        .map_err(GitError::Io)?;
    std::fs::write(admin.join("HEAD"), format!("ref: {branch_ref}\n")).map_err(GitError::Io)?;

    std::fs::create_dir_all(path).map_err(GitError::Io)?;
    std::fs::write(path.join(".git"), format!("gitdir: {}\n", admin.display())).map_err(GitError::Io)?;

    let wt_repo = gix::open(path).map_err(|e| backend(format!("failed to open new worktree: {e}")))?;
    let commit = wt_repo
        .find_commit(target)
        .map_err(|e| backend(format!("failed to find commit {target}: {e}")))?;
    let tree_id = commit
        .tree_id()
        .map_err(|e| backend(format!("failed to read tree of {target}: {e}")))?
        .detach();
    checkout_tree_to_dir(&wt_repo, tree_id, path)?;
    rebuild_index(&wt_repo, tree_id)?;
    Ok(())
}

pub fn worktree_remove(repo: &gix::Repository, path: &Path, force: bool) -> Result<(), GitError> {
    if !force && path.join(".git").exists() {
        if let Ok(wt_repo) = gix::open(path) {
            let head_tree = wt_repo.head_commit().ok().and_then(|c| c.tree_id().ok().map(|id| id.detach()));
            if let Some(head_tree) = head_tree {
                if !working_tree_matches_tree(&wt_repo, head_tree, path)? {
                    return Err(GitError::WorktreeError {
                        name: sanitized_name(path),
                        detail: "worktree has uncommitted changes".to_owned(),
                    });
                }
            }
        }
    }

    let admin = find_admin_dir(repo, path)?;
    if path.exists() {
        std::fs::remove_dir_all(path).map_err(GitError::Io)?;
    }
    if let Some(admin) = admin {
        if admin.exists() {
            std::fs::remove_dir_all(admin).map_err(GitError::Io)?;
        }
    }
    Ok(())
}

pub fn worktree_list(repo: &gix::Repository) -> Result<Vec<WorktreeInfo>, GitError> {
    let mut out = Vec::new();
    if let Some(workdir) = repo.workdir() {
        let head = repo.head_commit().ok().map(|c| crate::objects::from_gix_oid(c.id));
        let branch = crate::refs::current_branch(workdir).ok().flatten();
        out.push(WorktreeInfo {
            path: workdir.to_path_buf(),
            head,
            branch: branch.map(|b| RefName::branch(&b)),
        });
    }

    for entry in read_worktree_admin_dirs(repo)? {
        let (_name, admin) = entry;
        let Some(gitdir) = read_gitdir_pointer(&admin) else { continue };
        let Some(path) = gitdir.parent().map(Path::to_path_buf) else { continue };
        let branch = read_head_ref(&admin);
        let head = branch.as_deref().and_then(|b| resolve_branch_oid(repo, b));
        out.push(WorktreeInfo {
            path,
            head,
            branch: branch.and_then(|b| RefName::new(format!("refs/heads/{b}")).ok()),
        });
    }
    Ok(out)
}

pub fn worktree_prune(repo: &gix::Repository) -> Result<(), GitError> {
    for (_name, admin) in read_worktree_admin_dirs(repo)? {
        let stale = match read_gitdir_pointer(&admin) {
            Some(gitdir) => !gitdir.exists(),
            None => true,
        };
        if stale {
            std::fs::remove_dir_all(&admin).map_err(GitError::Io)?;
        }
    }
    Ok(())
}

fn resolve_branch_oid(repo: &gix::Repository, branch: &str) -> Option<GitOid> {
    let mut reference = repo.try_find_reference(format!("refs/heads/{branch}").as_str()).ok().flatten()?;
    let id = reference.peel_to_id_in_place().ok()?.detach();
    Some(crate::objects::from_gix_oid(id))
}

fn read_worktree_admin_dirs(repo: &gix::Repository) -> Result<Vec<(String, PathBuf)>, GitError> {
    let worktrees_dir = repo.git_dir().join("worktrees");
    if !worktrees_dir.exists() {
        return Ok(Vec::new());
    }
    let mut out = Vec::new();
    for entry in std::fs::read_dir(&worktrees_dir).map_err(GitError::Io)? {
        let entry = entry.map_err(GitError::Io)?;
        if entry.path().is_dir() {
            out.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    Ok(out)
}

fn read_gitdir_pointer(admin: &Path) -> Option<PathBuf> {
    let content = std::fs::read_to_string(admin.join("gitdir")).ok()?;
    Some(PathBuf::from(content.trim()))
}

fn read_head_ref(admin: &Path) -> Option<String> {
    let content = std::fs::read_to_string(admin.join("HEAD")).ok()?;
    content.trim().strip_prefix("ref: refs/heads/").map(str::to_owned)
}

fn find_admin_dir(repo: &gix::Repository, path: &Path) -> Result<Option<PathBuf>, GitError> {
    if let Ok(pointer) = std::fs::read_to_string(path.join(".git")) {
        if let Some(admin) = pointer.trim().strip_prefix("gitdir: ") {
            return Ok(Some(PathBuf::from(admin)));
        }
    }
    for (_name, admin) in read_worktree_admin_dirs(repo)? {
        if read_gitdir_pointer(&admin).and_then(|g| g.parent().map(Path::to_path_buf)).as_deref() == Some(path) {
            return Ok(Some(admin));
        }
    }
    Ok(None)
}
