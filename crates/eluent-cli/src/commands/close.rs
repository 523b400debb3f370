use std::path::Path;

use anyhow::{bail, Result};
use clap::Args;
use eluent_core::model::Status;

use crate::context::Context;
use crate::output;

#[derive(Args)]
pub struct CloseArgs {
    /// Atom ID or unique prefix.
    id: String,

    /// Free-text reason recorded on the atom (conventionally prefixed
    /// `"failed: ..."` to route `conditional_blocks` dependents).
    #[arg(long)]
    reason: Option<String>,

    /// Discard the atom instead of closing it.
    #[arg(long)]
    discard: bool,
}

pub fn run(cwd: &Path, args: CloseArgs) -> Result<()> {
    let mut ctx = Context::discover(cwd)?;
    let id = ctx.resolve(&args.id)?;
    let target = if args.discard { Status::Discard } else { Status::Closed };

    let current = ctx
        .repo
        .index()
        .find_by_id(&id)
        .ok_or_else(|| anyhow::anyhow!("no such atom: {id}"))?
        .status;
    if !current.can_transition_to(target) {
        bail!("cannot transition {id} from {current} to {target}");
    }

    let now = chrono::Utc::now();
    let updated = ctx.repo.update_atom(&id, |atom| {
        atom.status = target;
        atom.closed_at = Some(now);
        atom.close_reason = args.reason.clone();
    })?;
    output::print_atom_line(&updated);
    Ok(())
}
