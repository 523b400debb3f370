use std::path::Path;

use anyhow::Result;
use clap::Args;

use crate::context::Context;

#[derive(Args)]
pub struct InitArgs {
    /// Repository name to record in `config.yaml`. Inferred from the
    /// directory name if omitted.
    #[arg(long)]
    repo_name: Option<String>,
}

pub fn run(cwd: &Path, args: InitArgs) -> Result<()> {
    let ctx = Context::init(cwd, args.repo_name.as_deref())?;
    println!("[OK] initialised .eluent at {}", ctx.eluent_dir.display());
    println!("[OK] repo_name = {}", ctx.repo_name());
    Ok(())
}
