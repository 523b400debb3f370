//! Repository configuration (`.eluent/config.yaml`).
//!
//! Defines the typed configuration for a repository's `.eluent` directory:
//! the repo name, creation defaults, ephemeral/compaction housekeeping, and
//! sync/claim behaviour. Missing file or missing sections both yield
//! defaults — never an error.

use std::fmt;
use std::path::Path;

use serde::Deserialize;

use crate::error::EluentError;
use crate::model::atom::{IssueType, Priority};
use crate::model::types::RepoName;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level eluent repository configuration.
///
/// Parsed from `.eluent/config.yaml`. Unknown top-level keys are rejected
/// so typos surface immediately; every nested section is `#[serde(default)]`
/// so a partial or absent file still loads.
#[derive(Clone, Debug, PartialEq, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// The repository name used as the atom-ID prefix. `None` means infer
    /// it from the git remote or directory name.
    #[serde(default)]
    pub repo_name: Option<String>,

    /// Defaults applied when creating a new atom without explicit values.
    #[serde(default)]
    pub defaults: Defaults,

    /// Ephemeral-file housekeeping.
    #[serde(default)]
    pub ephemeral: EphemeralConfig,

    /// Two-stage compaction thresholds.
    #[serde(default)]
    pub compaction: CompactionConfig,

    /// Sync and claim-protocol behaviour.
    #[serde(default)]
    pub sync: SyncConfig,
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

/// Defaults applied when creating an atom.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Defaults {
    /// Priority assigned to a newly created atom when none is given.
    #[serde(default = "default_priority")]
    pub priority: u8,

    /// Issue type assigned to a newly created atom when none is given.
    #[serde(default = "default_issue_type")]
    pub issue_type: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            priority: default_priority(),
            issue_type: default_issue_type(),
        }
    }
}

const fn default_priority() -> u8 {
    2
}

fn default_issue_type() -> String {
    "task".to_owned()
}

impl Defaults {
    /// The validated priority.
    ///
    /// # Errors
    /// Returns a `Config` error if the value is outside 0..=4.
    pub fn priority(&self) -> Result<Priority, String> {
        Priority::new(self.priority).map_err(|e| format!("defaults.priority: {e}"))
    }

    /// The validated issue type.
    ///
    /// # Errors
    /// Returns a `Config` error if the value is not a recognised issue type.
    pub fn issue_type(&self) -> Result<IssueType, String> {
        self.issue_type
            .parse()
            .map_err(|e| format!("defaults.issue_type: {e}"))
    }
}

// ---------------------------------------------------------------------------
// EphemeralConfig
// ---------------------------------------------------------------------------

/// Housekeeping for `ephemeral.jsonl` (local-only, gitignored records).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EphemeralConfig {
    /// Remove ephemeral records older than this many days (1..=365).
    #[serde(default = "default_cleanup_days")]
    pub cleanup_days: u32,
}

impl Default for EphemeralConfig {
    fn default() -> Self {
        Self {
            cleanup_days: default_cleanup_days(),
        }
    }
}

const fn default_cleanup_days() -> u32 {
    30
}

// ---------------------------------------------------------------------------
// CompactionConfig
// ---------------------------------------------------------------------------

/// Two-stage age thresholds for compacting closed/discarded atoms.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompactionConfig {
    /// Age (days, 1..=365) at which tier-1 compaction applies.
    #[serde(default = "default_tier1_days")]
    pub tier1_days: u32,

    /// Age (days, must exceed `tier1_days`, capped at 730) at which
    /// tier-2 compaction applies.
    #[serde(default = "default_tier2_days")]
    pub tier2_days: u32,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            tier1_days: default_tier1_days(),
            tier2_days: default_tier2_days(),
        }
    }
}

const fn default_tier1_days() -> u32 {
    90
}

const fn default_tier2_days() -> u32 {
    365
}

// ---------------------------------------------------------------------------
// SyncConfig
// ---------------------------------------------------------------------------

/// How the sync and claim protocol behave against the remote.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SyncConfig {
    /// Branch the claim ledger worktree checks out.
    #[serde(default = "default_ledger_branch")]
    pub ledger_branch: String,

    /// Push immediately after a local claim commit.
    #[serde(default = "default_auto_claim_push")]
    pub auto_claim_push: bool,

    /// Push retry limit on non-fast-forward (1..=100).
    #[serde(default = "default_claim_retries")]
    pub claim_retries: u32,

    /// Stale-claim auto-release age in hours. `None` disables
    /// auto-release; when set, must be > 0 and capped at 720.
    #[serde(default)]
    pub claim_timeout_hours: Option<u32>,

    /// What to do when a network operation fails mid-claim.
    #[serde(default)]
    pub offline_mode: OfflineMode,

    /// Per-network-operation timeout, in seconds (5..=300).
    #[serde(default = "default_network_timeout")]
    pub network_timeout: u32,

    /// Replace the default `~/.eluent/` base directory.
    #[serde(default)]
    pub global_path_override: Option<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ledger_branch: default_ledger_branch(),
            auto_claim_push: default_auto_claim_push(),
            claim_retries: default_claim_retries(),
            claim_timeout_hours: None,
            offline_mode: OfflineMode::default(),
            network_timeout: default_network_timeout(),
            global_path_override: None,
        }
    }
}

fn default_ledger_branch() -> String {
    "eluent-ledger".to_owned()
}

const fn default_auto_claim_push() -> bool {
    true
}

const fn default_claim_retries() -> u32 {
    5
}

const fn default_network_timeout() -> u32 {
    30
}

/// What a claim does when every network operation it tries fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineMode {
    /// Claim locally and queue the record in `.ledger-sync-state` for
    /// later reconciliation.
    #[default]
    Local,
    /// Return a failure instead of claiming locally.
    Fail,
}

impl fmt::Display for OfflineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => write!(f, "local"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading and validation
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields all defaults. An existing file with invalid
    /// YAML, unknown fields, or an out-of-range value returns
    /// [`EluentError::Config`].
    ///
    /// # Errors
    /// Returns `EluentError::Config` on read failure, parse failure, or
    /// range validation failure.
    pub fn load(path: &Path) -> Result<Self, EluentError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(EluentError::Config {
                    path: path.to_owned(),
                    detail: format!("could not read file: {e}"),
                });
            }
        };
        Self::parse(&contents).map_err(|detail| EluentError::Config {
            path: path.to_owned(),
            detail,
        })
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    /// Returns a human-readable message on invalid YAML, an unknown field,
    /// or a value outside its allowed range.
    pub fn parse(yaml: &str) -> Result<Self, String> {
        let cfg: Self = serde_yaml::from_str(yaml).map_err(|e| e.to_string())?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Resolve the configured or inferred repository name.
    ///
    /// # Errors
    /// Returns an error if `repo_name` is set but does not match
    /// `^[a-z][a-z0-9_-]{0,31}$`.
    pub fn repo_name(&self, fallback: &str) -> Result<RepoName, String> {
        match &self.repo_name {
            Some(name) => RepoName::from_config(name).map_err(|e| format!("repo_name: {e}")),
            None => RepoName::sanitize(fallback).map_err(|e| format!("repo_name: {e}")),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if let Some(name) = &self.repo_name {
            RepoName::from_config(name).map_err(|e| format!("repo_name: {e}"))?;
        }
        self.defaults.priority()?;
        self.defaults.issue_type()?;

        if !(1..=365).contains(&self.ephemeral.cleanup_days) {
            return Err(format!(
                "ephemeral.cleanup_days must be in 1..=365, got {}",
                self.ephemeral.cleanup_days
            ));
        }

        if !(1..=365).contains(&self.compaction.tier1_days) {
            return Err(format!(
                "compaction.tier1_days must be in 1..=365, got {}",
                self.compaction.tier1_days
            ));
        }
        if self.compaction.tier2_days <= self.compaction.tier1_days
            || self.compaction.tier2_days > 730
        {
            return Err(format!(
                "compaction.tier2_days must exceed tier1_days ({}) and be <= 730, got {}",
                self.compaction.tier1_days, self.compaction.tier2_days
            ));
        }

        if self.sync.ledger_branch.is_empty() {
            return Err("sync.ledger_branch must not be empty".to_owned());
        }
        if !(1..=100).contains(&self.sync.claim_retries) {
            return Err(format!(
                "sync.claim_retries must be in 1..=100, got {}",
                self.sync.claim_retries
            ));
        }
        if let Some(hours) = self.sync.claim_timeout_hours
            && (hours == 0 || hours > 720)
        {
            return Err(format!(
                "sync.claim_timeout_hours must be in 1..=720 when set, got {hours}"
            ));
        }
        if !(5..=300).contains(&self.sync.network_timeout) {
            return Err(format!(
                "sync.network_timeout must be in 5..=300, got {}",
                self.sync.network_timeout
            ));
        }

        Ok(())
    }
}
