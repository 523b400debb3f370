//! `.sync-state`: the last-known-common-ancestor bookkeeping the three-way
//! merge needs between runs.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EluentError;

/// Persisted sync bookkeeping. A missing or corrupt file resets to
/// "no base", which degrades the next merge to a full union (every field
/// treated as independently changed on both sides).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    /// When the last successful sync completed.
    #[serde(default)]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// The commit both sides agreed on before the last sync.
    #[serde(default)]
    pub base_commit: Option<String>,
    /// This clone's head after the last sync.
    #[serde(default)]
    pub local_head: Option<String>,
    /// The remote's head as last observed.
    #[serde(default)]
    pub remote_head: Option<String>,
}

impl SyncState {
    /// Load `.sync-state` from `path`. A missing file yields the default
    /// (no base); a file that fails to parse is treated the same way,
    /// with a warning, rather than failing the sync.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), error = %err, "sync state corrupt, resetting to no base");
                Self::default()
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "could not read sync state, resetting to no base");
                Self::default()
            }
        }
    }

    /// Persist this state to `path`, creating parent directories if
    /// needed.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), EluentError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self).map_err(std::io::Error::from)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}
