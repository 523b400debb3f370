use std::path::Path;

use anyhow::Result;

use crate::context::Context;

pub fn run(cwd: &Path) -> Result<()> {
    let ctx = Context::discover(cwd)?;
    println!("[OK] .eluent found at {}", ctx.eluent_dir.display());
    println!("[OK] repo_name = {}", ctx.repo_name());
    println!("[OK] {} atoms, {} bonds, {} comments loaded",
        ctx.repo.index().all_atoms().count(),
        ctx.repo.index().all_bonds().count(),
        ctx.repo.index().all_comments().count(),
    );

    match &ctx.config.sync.claim_timeout_hours {
        Some(hours) => {
            let released = ctx.claim_protocol().release_stale(*hours, chrono::Utc::now())?;
            if released.is_empty() {
                println!("[OK] no stale claims past {hours}h");
            } else {
                println!("[WARN] released {} stale claim(s):", released.len());
                for id in released {
                    println!("       {id}");
                }
            }
        }
        None => println!("[..] sync.claim_timeout_hours unset; stale-claim auto-release disabled"),
    }

    Ok(())
}
