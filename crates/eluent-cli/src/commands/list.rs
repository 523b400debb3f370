use std::path::Path;

use anyhow::Result;
use clap::Args;
use eluent_core::model::Status;

use crate::context::Context;
use crate::output;

#[derive(Args)]
pub struct ListArgs {
    /// Restrict to atoms with this status (open, in_progress, deferred,
    /// closed, discard). Lists every status if omitted.
    #[arg(long)]
    status: Option<String>,

    /// Restrict to this assignee.
    #[arg(long)]
    assignee: Option<String>,
}

pub fn run(cwd: &Path, args: ListArgs) -> Result<()> {
    let ctx = Context::discover(cwd)?;
    let status: Option<Status> = args.status.as_deref().map(str::parse).transpose()?;

    let mut atoms: Vec<_> = ctx
        .repo
        .index()
        .all_atoms()
        .filter(|a| status.is_none_or(|s| a.status == s))
        .filter(|a| args.assignee.is_none() || a.assignee.as_deref() == args.assignee.as_deref())
        .collect();
    atoms.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    for atom in atoms {
        output::print_atom_line(atom);
    }
    Ok(())
}
