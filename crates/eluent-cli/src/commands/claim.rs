use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::context::Context;

#[derive(Args)]
pub struct ClaimArgs {
    /// Atom ID or unique prefix.
    id: String,
    /// The agent claiming the atom.
    #[arg(long)]
    agent: String,
}

#[derive(Args)]
pub struct ReleaseArgs {
    /// Atom ID or unique prefix.
    id: String,
    /// The agent releasing the atom.
    #[arg(long)]
    agent: String,
}

#[derive(Args)]
pub struct HeartbeatArgs {
    /// Atom ID or unique prefix.
    id: String,
    /// The agent that holds the claim.
    #[arg(long)]
    agent: String,
}

pub fn run_claim(cwd: &Path, args: ClaimArgs) -> Result<()> {
    let ctx = Context::discover(cwd)?;
    let id = ctx.resolve(&args.id)?;
    let outcome = ctx.claim_protocol().claim(&id, &args.agent)?;
    println!("{id}: {outcome:?}");
    Ok(())
}

pub fn run_release(cwd: &Path, args: ReleaseArgs) -> Result<()> {
    let ctx = Context::discover(cwd)?;
    let id = ctx.resolve(&args.id)?;
    ctx.claim_protocol().release(&id, &args.agent)?;
    println!("{id}: released");
    Ok(())
}

pub fn run_heartbeat(cwd: &Path, args: HeartbeatArgs) -> Result<()> {
    let ctx = Context::discover(cwd)?;
    let id = ctx.resolve(&args.id)?;
    ctx.claim_protocol().heartbeat(&id, &args.agent);
    println!("{id}: heartbeat sent");
    Ok(())
}
