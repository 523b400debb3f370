//! Fetch and push, the two network operations kept as `git` CLI subprocess
//! calls rather than gix.
//!
//! gix has no high-level push transport yet, and eluent's own trait (like
//! the upstream abstraction it's grounded on) never defines a network
//! fetch at the object-model level either — both are left to the porcelain
//! command, which already knows how to negotiate transports, credentials,
//! and protocol versions correctly.

use std::path::Path;
use std::time::Duration;

use tracing::{instrument, warn};

use crate::error::GitError;
use crate::process;
use crate::types::{PushOutcome, RefName};

#[instrument(skip(root))]
pub fn fetch(root: &Path, remote: &str, refname: &RefName, timeout: Duration) -> Result<(), GitError> {
    process::run_with_timeout(root, &["fetch", remote, refname.as_str()], timeout)?;
    Ok(())
}

#[instrument(skip(root))]
pub fn push(
    root: &Path,
    remote: &str,
    local_ref: &RefName,
    remote_ref: &RefName,
    timeout: Duration,
) -> Result<PushOutcome, GitError> {
    let refspec = format!("{}:{}", local_ref.as_str(), remote_ref.as_str());
    match process::run_with_timeout(root, &["push", remote, &refspec], timeout) {
        Ok(_) => Ok(PushOutcome::Accepted),
        Err(GitError::CommandFailed { stderr, .. })
            if stderr.contains("non-fast-forward") || stderr.contains("fetch first") =>
        {
            warn!(remote, remote_ref = remote_ref.as_str(), "push rejected, not a fast-forward");
            Ok(PushOutcome::Rejected)
        }
        Err(e) => Err(e),
    }
}
