//! gix-backed rev-parse, ancestry, and current-branch lookups.

use std::path::Path;

use crate::error::GitError;
use crate::objects::from_gix_oid;
use crate::types::GitOid;

fn backend(message: impl Into<String>) -> GitError {
    GitError::Backend { message: message.into() }
}

pub fn rev_parse(repo: &gix::Repository, spec: &str) -> Result<Option<GitOid>, GitError> {
    match repo.rev_parse_single(spec) {
        Ok(id) => Ok(Some(from_gix_oid(id.detach()))),
        Err(err) if rev_not_found(&err) => Ok(None),
        Err(err) => Err(backend(format!("failed to resolve {spec}: {err}"))),
    }
}

/// Whether `err` represents an ordinary "no such revision" result rather
/// than a real backend failure (corrupt object store, I/O error, ambiguous
/// spec). gix doesn't expose a dedicated variant for this, so walk the
/// error's source chain for the wording it actually produces.
fn rev_not_found(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(source) = current {
        let msg = source.to_string();
        if msg.contains("not found") || msg.contains("does not exist") || msg.contains("unknown revision") {
            return true;
        }
        current = source.source();
    }
    false
}

pub fn is_ancestor(
    repo: &gix::Repository,
    ancestor: &GitOid,
    descendant: &GitOid,
) -> Result<bool, GitError> {
    if ancestor == descendant {
        return Ok(true);
    }
    let ancestor_id = crate::objects::to_gix_oid(ancestor);
    let descendant_id = crate::objects::to_gix_oid(descendant);
    let walk = repo
        .rev_walk([descendant_id])
        .all()
        .map_err(|e| backend(format!("failed to walk history from {descendant}: {e}")))?;
    for info in walk {
        let info = info.map_err(|e| backend(format!("failed to read commit during walk: {e}")))?;
        if info.id == ancestor_id {
            return Ok(true);
        }
    }
    Ok(false)
}

/// The short branch name checked out at `worktree_path`, or `None` if its
/// `HEAD` is detached.
pub fn current_branch(worktree_path: &Path) -> Result<Option<String>, GitError> {
    let repo = gix::open(worktree_path)
        .map_err(|e| backend(format!("failed to open {}: {e}", worktree_path.display())))?;
    match repo.head().map_err(|e| backend(format!("failed to read HEAD: {e}")))?.kind {
        gix::head::Kind::Symbolic(r) => Ok(Some(short_branch_name(r.name.as_bstr().to_string()))),
        gix::head::Kind::Unborn(target) => Ok(Some(short_branch_name(target.as_bstr().to_string()))),
        gix::head::Kind::Detached { .. } => Ok(None),
    }
}

fn short_branch_name(full: String) -> String {
    full.strip_prefix("refs/heads/").map(str::to_owned).unwrap_or(full)
}

/// Delete a local branch, if it exists. A no-op otherwise.
pub fn delete_branch(repo: &gix::Repository, name: &str) -> Result<(), GitError> {
    let full = format!("refs/heads/{name}");
    let Some(found) = repo
        .try_find_reference(full.as_str())
        .map_err(|e| backend(format!("failed to look up {full}: {e}")))?
    else {
        return Ok(());
    };
    found
        .delete()
        .map_err(|e| backend(format!("failed to delete {full}: {e}")))?;
    Ok(())
}
