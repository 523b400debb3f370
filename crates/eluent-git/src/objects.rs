//! gix-backed object read/write, tree (de)serialization against a working
//! directory, and index rebuilding.
//!
//! eluent's worktrees hold nothing but plain JSONL files, so the tree
//! operations here are a flat recursive walk rather than the staged-index
//! editing gix's `tree-editor` feature targets: every `commit_all` or
//! checkout rewrites the whole tree from the directory's current contents.

use std::path::Path;

use crate::error::GitError;

pub fn to_gix_oid(oid: &crate::types::GitOid) -> gix::ObjectId {
    gix::ObjectId::from_hex(oid.as_str().as_bytes()).expect("GitOid is always valid hex")
}

pub fn from_gix_oid(oid: gix::ObjectId) -> crate::types::GitOid {
    crate::types::GitOid::new(&oid.to_hex().to_string()).expect("gix oids are valid hex")
}

fn backend(message: impl Into<String>) -> GitError {
    GitError::Backend { message: message.into() }
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Write every file under `dir` (skipping `.git`) as a git tree, returning
/// the resulting tree's OID. Subdirectories recurse into nested trees.
pub fn write_dir_as_tree(repo: &gix::Repository, dir: &Path) -> Result<gix::ObjectId, GitError> {
    let mut entries = Vec::new();
    let read_dir = std::fs::read_dir(dir).map_err(GitError::Io)?;
    for entry in read_dir {
        let entry = entry.map_err(GitError::Io)?;
        let name = entry.file_name();
        if name == ".git" {
            continue;
        }
        let path = entry.path();
        let meta = entry.metadata().map_err(GitError::Io)?;
        let (mode, oid) = if meta.is_dir() {
            let sub = write_dir_as_tree(repo, &path)?;
            (gix::objs::tree::EntryKind::Tree, sub)
        } else {
            let data = std::fs::read(&path).map_err(GitError::Io)?;
            let id = repo
                .write_blob(&data)
                .map_err(|e| backend(format!("failed to write blob for {}: {e}", path.display())))?
                .detach();
            let kind = if is_executable(&meta) {
                gix::objs::tree::EntryKind::BlobExecutable
            } else {
                gix::objs::tree::EntryKind::Blob
            };
            (kind, id)
        };
        entries.push(gix::objs::tree::Entry {
            mode: mode.into(),
            filename: name.to_string_lossy().into_owned().into(),
            oid,
        });
    }
    entries.sort_unstable();
    let tree = gix::objs::Tree { entries };
    let id = repo
        .write_object(&tree)
        .map_err(|e| backend(format!("failed to write tree for {}: {e}", dir.display())))?;
    Ok(id.detach())
}

/// Replace the contents of `dir` (except `.git`) with the files recorded in
/// the tree `tree_id`, recursing into subtrees.
pub fn checkout_tree_to_dir(
    repo: &gix::Repository,
    tree_id: gix::ObjectId,
    dir: &Path,
) -> Result<(), GitError> {
    for existing in std::fs::read_dir(dir).map_err(GitError::Io)? {
        let existing = existing.map_err(GitError::Io)?;
        if existing.file_name() == ".git" {
            continue;
        }
        let path = existing.path();
        if path.is_dir() {
            std::fs::remove_dir_all(&path).map_err(GitError::Io)?;
        } else {
            std::fs::remove_file(&path).map_err(GitError::Io)?;
        }
    }

    let tree = repo
        .find_tree(tree_id)
        .map_err(|e| backend(format!("tree {tree_id}: {e}")))?;
    for result in tree.iter() {
        let entry = result.map_err(|e| backend(format!("failed to decode tree entry: {e}")))?;
        let name = entry.inner.filename.to_string();
        let entry_path = dir.join(&name);
        match entry.inner.mode.kind() {
            gix::objs::tree::EntryKind::Tree => {
                std::fs::create_dir_all(&entry_path).map_err(GitError::Io)?;
                checkout_tree_to_dir(repo, entry.inner.oid.to_owned(), &entry_path)?;
            }
            gix::objs::tree::EntryKind::Commit | gix::objs::tree::EntryKind::Link => {
                return Err(backend(format!("unsupported tree entry kind for {name}")));
            }
            kind => {
                let blob = repo
                    .find_blob(entry.inner.oid.to_owned())
                    .map_err(|e| backend(format!("blob for {name}: {e}")))?;
                std::fs::write(&entry_path, blob.data.as_slice()).map_err(GitError::Io)?;
                if kind == gix::objs::tree::EntryKind::BlobExecutable {
                    set_executable(&entry_path)?;
                }
            }
        }
    }
    Ok(())
}

/// Whether `dir` (ignoring `.git`) matches the contents of `tree_id`
/// exactly — same files, same content, no extras.
///
/// Unlike comparing `write_dir_as_tree(repo, dir)` against `tree_id`, this
/// never writes anything to the object database: it walks the existing
/// tree and reads blobs that are already there, so checking "is this
/// worktree dirty" doesn't itself leave orphan loose objects behind.
pub fn working_tree_matches_tree(repo: &gix::Repository, tree_id: gix::ObjectId, dir: &Path) -> Result<bool, GitError> {
    let tree = repo
        .find_tree(tree_id)
        .map_err(|e| backend(format!("tree {tree_id}: {e}")))?;
    let mut seen = std::collections::HashSet::new();
    for result in tree.iter() {
        let entry = result.map_err(|e| backend(format!("failed to decode tree entry: {e}")))?;
        let name = entry.inner.filename.to_string();
        seen.insert(name.clone());
        let entry_path = dir.join(&name);
        match entry.inner.mode.kind() {
            gix::objs::tree::EntryKind::Tree => {
                if !entry_path.is_dir() {
                    return Ok(false);
                }
                if !working_tree_matches_tree(repo, entry.inner.oid.to_owned(), &entry_path)? {
                    return Ok(false);
                }
            }
            gix::objs::tree::EntryKind::Commit | gix::objs::tree::EntryKind::Link => {
                return Err(backend(format!("unsupported tree entry kind for {name}")));
            }
            _ => {
                let Ok(disk) = std::fs::read(&entry_path) else {
                    return Ok(false);
                };
                let blob = repo
                    .find_blob(entry.inner.oid.to_owned())
                    .map_err(|e| backend(format!("blob for {name}: {e}")))?;
                if blob.data.as_slice() != disk.as_slice() {
                    return Ok(false);
                }
            }
        }
    }
    for existing in std::fs::read_dir(dir).map_err(GitError::Io)? {
        let existing = existing.map_err(GitError::Io)?;
        if existing.file_name() == ".git" {
            continue;
        }
        if !seen.contains(&existing.file_name().to_string_lossy().into_owned()) {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> Result<(), GitError> {
    use std::os::unix::fs::PermissionsExt as _;
    let mut perms = std::fs::metadata(path).map_err(GitError::Io)?.permissions();
    perms.set_mode(perms.mode() | 0o111);
    std::fs::set_permissions(path, perms).map_err(GitError::Io)
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> Result<(), GitError> {
    Ok(())
}

/// Rebuild the repository's index to exactly match `tree_id`, the way
/// `git reset --hard <tree>` leaves the index.
pub fn rebuild_index(repo: &gix::Repository, tree_id: gix::ObjectId) -> Result<(), GitError> {
    let state = gix::index::State::from_tree(&tree_id, &repo.objects, Default::default())
        .map_err(|e| backend(format!("failed to build index from tree {tree_id}: {e}")))?;
    let mut index = gix::index::File::from_state(state, repo.index_path());
    index
        .write(Default::default())
        .map_err(|e| backend(format!("failed to write index: {e}")))?;
    Ok(())
}

/// Create a commit over `tree`, with the given `parents`, and point
/// `update_ref` at it.
pub fn create_commit(
    repo: &gix::Repository,
    tree: gix::ObjectId,
    parents: &[gix::ObjectId],
    message: &str,
    update_ref: &str,
) -> Result<gix::ObjectId, GitError> {
    let author = repo
        .author()
        .ok_or_else(|| backend("no author identity configured"))?
        .map_err(|e| backend(format!("failed to read author identity: {e}")))?;
    let committer = repo
        .committer()
        .ok_or_else(|| backend("no committer identity configured"))?
        .map_err(|e| backend(format!("failed to read committer identity: {e}")))?;

    let id = repo
        .commit_as(committer, author, update_ref, message, tree, parents.to_vec())
        .map_err(|e| backend(format!("failed to create commit: {e}")))?;
    Ok(id.detach())
}
