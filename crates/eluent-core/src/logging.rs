//! Tracing helpers shared across the core crate.
//!
//! This crate never installs a subscriber — that's `eluent-cli`'s job
//! (`eluent_cli::telemetry`). What lives here are small span constructors
//! for the seams called out in the logging design: git subprocess
//! invocations, claim attempts, and merge conflicts, so every call site
//! emits consistent fields instead of ad hoc `tracing::info!` calls.

use tracing::Span;

/// A span wrapping one `eluent-git` subprocess invocation, carrying the
/// command name so failures are traceable without bespoke logging.
pub fn git_command_span(command: &str) -> Span {
    tracing::info_span!("git_command", command = %command)
}

/// A span wrapping one claim attempt.
pub fn claim_span(atom_id: &str, agent: &str) -> Span {
    tracing::info_span!("claim_attempt", atom_id = %atom_id, agent = %agent)
}

/// A span wrapping one sync pass.
pub fn sync_span(repo_name: &str) -> Span {
    tracing::info_span!("sync", repo_name = %repo_name)
}
