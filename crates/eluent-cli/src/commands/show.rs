use std::path::Path;

use anyhow::{Context as _, Result};
use clap::Args;
use eluent_core::EluentError;

use crate::context::Context;
use crate::output;

#[derive(Args)]
pub struct ShowArgs {
    /// Atom ID or unique prefix.
    id: String,
}

pub fn run(cwd: &Path, args: ShowArgs) -> Result<()> {
    let ctx = Context::discover(cwd)?;
    let id = ctx.resolve(&args.id)?;
    let atom = ctx
        .repo
        .index()
        .find_by_id(&id)
        .with_context(|| EluentError::AtomNotFound { id: id.to_string() }.to_string())?;

    output::print_atom_detail(atom);

    let blockers = eluent_core::graph::direct_blockers(ctx.repo.index(), &id);
    if !blockers.is_empty() {
        println!("  blocked_by:  {}", blockers.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
    }
    let dependents = eluent_core::graph::direct_dependents(ctx.repo.index(), &id);
    if !dependents.is_empty() {
        println!("  blocks:      {}", dependents.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
    }
    let children = ctx.repo.index().children_of(&id);
    if !children.is_empty() {
        println!("  children:    {}", children.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "));
    }
    for comment in ctx.repo.index().comments_for(&id) {
        println!("  - [{}] {} ({}): {}", comment.id, comment.author, comment.created_at.to_rfc3339(), comment.content);
    }
    Ok(())
}
