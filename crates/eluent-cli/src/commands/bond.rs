use std::path::Path;

use anyhow::{bail, Result};
use chrono::Utc;
use clap::{Args, Subcommand};
use eluent_core::model::{Bond, DependencyType};

use crate::context::Context;

#[derive(Subcommand)]
pub enum BondCommand {
    /// Create a dependency bond between two atoms.
    Add(AddArgs),
}

#[derive(Args)]
pub struct AddArgs {
    /// Dependency type: blocks, parent_child, conditional_blocks,
    /// waits_for, related, duplicates, discovered_from, replies_to.
    dependency_type: String,
    /// Source atom (ID or prefix).
    from: String,
    /// Target atom (ID or prefix).
    to: String,
}

pub fn run(cwd: &Path, action: BondCommand) -> Result<()> {
    let BondCommand::Add(args) = action;
    let mut ctx = Context::discover(cwd)?;

    let dependency_type: DependencyType =
        args.dependency_type.parse().map_err(|e| anyhow::anyhow!("{e}"))?;
    let source_id = ctx.resolve(&args.from)?;
    let target_id = ctx.resolve(&args.to)?;

    if ctx.repo.index().find_by_id(&source_id).is_none() {
        bail!("no such atom: {source_id}");
    }
    if ctx.repo.index().find_by_id(&target_id).is_none() {
        bail!("no such atom: {target_id}");
    }

    let bond = Bond::new(source_id.clone(), target_id.clone(), dependency_type, Utc::now())?;
    ctx.repo.add_bond(bond)?;
    println!("{dependency_type} {source_id} -> {target_id}");
    Ok(())
}
