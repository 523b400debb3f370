//! Cross-process advisory file locking, used both for the JSONL append
//! lock and the claim-protocol ledger lock.
//!
//! A single wrapper around `fs2`'s `FileExt` so the rest of the crate has
//! one trait-free API to call; on a non-Unix host a different backend
//! would be substituted here without touching callers (§9 design note on
//! cross-process locking).

use std::fs::{File, OpenOptions};
use std::path::Path;

use fs2::FileExt;

/// A held exclusive advisory lock on a file. Releasing happens on drop,
/// so the lock cannot outlive its scope even if the holder panics.
pub struct FileLock {
    file: File,
}

impl FileLock {
    /// Open (creating if necessary) and acquire an exclusive lock on
    /// `path`, blocking until it is available.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the lock cannot
    /// be acquired.
    pub fn acquire(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { file })
    }

    /// Try to acquire the lock without blocking.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, or `Ok(None)` if
    /// another process currently holds the lock.
    pub fn try_acquire(path: &Path) -> std::io::Result<Option<Self>> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self { file })),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn try_acquire_fails_while_already_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");
        let _held = FileLock::acquire(&path).unwrap();
        let second = FileLock::try_acquire(&path).unwrap();
        assert!(second.is_none());
    }

    #[test]
    fn lock_is_released_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.lock");
        {
            let _held = FileLock::acquire(&path).unwrap();
        }
        let second = FileLock::try_acquire(&path).unwrap();
        assert!(second.is_some());
    }
}
