//! Locates a repository's `.eluent/` directory, loads its configuration,
//! and wires together the git backend, repository, and claim/sync
//! protocol drivers the commands need.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context as _, Result};
use eluent_core::claim::ClaimProtocol;
use eluent_core::config::Config;
use eluent_core::id;
use eluent_core::model::types::{AtomId, RepoName};
use eluent_core::repo::Repository;
use eluent_core::sync::Synchronizer;
use eluent_git::{GitRepo as _, GixGitRepo};

const REMOTE: &str = "origin";

/// Everything a command needs: the loaded repository, its configuration,
/// and a git backend bound to the repository root.
pub struct Context {
    pub root: PathBuf,
    pub eluent_dir: PathBuf,
    pub config: Config,
    pub repo: Repository,
    pub git: GixGitRepo,
}

impl Context {
    /// Walk up from `start` looking for a `.eluent/` directory, load its
    /// configuration and data files, and bind a git backend to the
    /// enclosing repository root.
    ///
    /// # Errors
    /// Returns an error if no `.eluent/` directory is found above `start`,
    /// or if configuration or data cannot be loaded.
    pub fn discover(start: &Path) -> Result<Self> {
        let root = find_eluent_root(start)
            .with_context(|| format!("no .eluent directory found above {}", start.display()))?;
        let eluent_dir = root.join(".eluent");
        let config = Config::load(&eluent_dir.join("config.yaml"))?;
        let fallback_name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "repo".to_owned());
        let repo_name = config
            .repo_name(&fallback_name)
            .map_err(|detail| anyhow::anyhow!("invalid repo_name in config.yaml: {detail}"))?;
        let repo = Repository::open(&eluent_dir, repo_name)?;
        let git = GixGitRepo::open(root.clone())?;
        Ok(Self { root, eluent_dir, config, repo, git })
    }

    /// Initialise a brand new `.eluent/` directory at `root` (which must
    /// already be inside a git working tree).
    ///
    /// # Errors
    /// Returns an error if `.eluent/` already exists, or if any file
    /// cannot be written.
    pub fn init(root: &Path, repo_name: Option<&str>) -> Result<Self> {
        let eluent_dir = root.join(".eluent");
        if eluent_dir.exists() {
            bail!(".eluent already exists at {}", eluent_dir.display());
        }
        std::fs::create_dir_all(&eluent_dir)?;
        std::fs::write(
            eluent_dir.join(".gitignore"),
            "ephemeral.jsonl\n.sync-state\n",
        )?;
        if let Some(name) = repo_name {
            std::fs::write(&eluent_dir.join("config.yaml"), format!("repo_name: {name}\n"))?;
        }
        Self::discover(root)
    }

    /// The repository's sanitised name.
    #[must_use]
    pub fn repo_name(&self) -> &RepoName {
        self.repo.repo_name()
    }

    /// Resolve a full ID, `<repo>-<prefix>`, or bare prefix against the
    /// loaded index, scoped to this repository by default.
    ///
    /// # Errors
    /// Returns an error if `input` is a relative reference, matches no
    /// atom, or matches more than one.
    pub fn resolve(&self, input: &str) -> Result<AtomId> {
        id::resolve(input, Some(self.repo_name()), self.repo.index())
            .map_err(|e| anyhow::anyhow!("{e}"))
    }

    fn base_dir(&self) -> PathBuf {
        if let Some(override_path) = &self.config.sync.global_path_override {
            return PathBuf::from(override_path).join(self.repo_name().as_str());
        }
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("eluent")
            .join(self.repo_name().as_str())
    }

    /// Per-network-operation timeout from configuration.
    #[must_use]
    pub fn network_timeout(&self) -> Duration {
        Duration::from_secs(u64::from(self.config.sync.network_timeout))
    }

    /// Build a claim protocol driver over this repository's ledger
    /// worktree.
    #[must_use]
    pub fn claim_protocol(&self) -> ClaimProtocol<'_> {
        let base = self.base_dir();
        ClaimProtocol::new(
            &self.git,
            base.join(".sync-worktree"),
            base.join(".ledger.lock"),
            base.join(".ledger-sync-state"),
            REMOTE,
            self.config.sync.ledger_branch.clone(),
            self.network_timeout(),
            self.config.sync.claim_retries,
            self.config.sync.offline_mode,
        )
    }

    /// Build a synchroniser for this repository's main branch.
    ///
    /// # Errors
    /// Returns an error if the current branch cannot be determined.
    pub fn synchronizer(&self) -> Result<Synchronizer<'_>> {
        let branch = self
            .git
            .current_branch(&self.root)?
            .context("HEAD is detached; sync requires a checked-out branch")?;
        Ok(Synchronizer::new(
            &self.git,
            self.eluent_dir.clone(),
            REMOTE,
            branch,
            self.network_timeout(),
        ))
    }
}

fn find_eluent_root(start: &Path) -> Option<PathBuf> {
    let mut dir = start.to_owned();
    loop {
        if dir.join(".eluent").is_dir() {
            return Some(dir);
        }
        if !dir.pop() {
            return None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_init(dir: &Path) {
        let status = std::process::Command::new("git")
            .args(["init", "--initial-branch=main"])
            .current_dir(dir)
            .status()
            .expect("spawn git");
        assert!(status.success());
        std::process::Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(dir)
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["config", "user.name", "Test"])
            .current_dir(dir)
            .status()
            .unwrap();
        std::fs::write(dir.join(".gitkeep"), "").unwrap();
        std::process::Command::new("git")
            .args(["add", "-A"])
            .current_dir(dir)
            .status()
            .unwrap();
        std::process::Command::new("git")
            .args(["commit", "-m", "initial commit"])
            .current_dir(dir)
            .status()
            .unwrap();
    }

    #[test]
    fn init_creates_eluent_directory_with_config() {
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        let ctx = Context::init(dir.path(), Some("myproj")).unwrap();
        assert_eq!(ctx.repo_name().as_str(), "myproj");
        assert!(dir.path().join(".eluent/data.jsonl").exists());
        assert!(dir.path().join(".eluent/.gitignore").exists());
    }

    #[test]
    fn init_twice_fails() {
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        Context::init(dir.path(), None).unwrap();
        assert!(Context::init(dir.path(), None).is_err());
    }

    #[test]
    fn discover_walks_up_from_a_nested_directory() {
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        Context::init(dir.path(), Some("proj")).unwrap();
        let nested = dir.path().join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        let ctx = Context::discover(&nested).unwrap();
        assert_eq!(ctx.root, dir.path());
    }

    #[test]
    fn discover_without_eluent_dir_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Context::discover(dir.path()).is_err());
    }

    #[test]
    fn resolve_finds_an_exact_match_by_full_id() {
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        let mut ctx = Context::init(dir.path(), Some("proj")).unwrap();
        let id = eluent_core::model::types::AtomId::generate(ctx.repo_name().clone());
        let atom = eluent_core::model::Atom::new(
            id.clone(),
            "t",
            eluent_core::model::IssueType::Task,
            chrono::Utc::now(),
        )
        .unwrap();
        ctx.repo.create_atom(atom, eluent_core::repo::FileClass::Primary).unwrap();

        assert_eq!(ctx.resolve(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn resolve_rejects_relative_references() {
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        let ctx = Context::init(dir.path(), Some("proj")).unwrap();
        assert!(ctx.resolve(".foo").is_err());
    }
}
