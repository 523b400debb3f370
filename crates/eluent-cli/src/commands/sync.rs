use std::path::Path;

use anyhow::Result;
use clap::Args;
use eluent_git::{GitRepo as _, PushOutcome, RefName};

use crate::context::Context;

#[derive(Args)]
pub struct SyncArgs {
    /// Commit and push the merged result after syncing.
    #[arg(long)]
    push: bool,
}

pub fn run(cwd: &Path, args: SyncArgs) -> Result<()> {
    let mut ctx = Context::discover(cwd)?;

    match ctx.claim_protocol().reconcile_offline_claims() {
        Ok(reconciled) if !reconciled.is_empty() => {
            println!("reconciled {} offline claim(s):", reconciled.len());
            for atom_id in reconciled {
                println!("  - {atom_id}");
            }
        }
        Ok(_) => {}
        Err(err) => println!("[WARN] offline claim reconciliation skipped: {err}"),
    }

    let report = ctx.synchronizer()?.sync()?;

    println!("atoms_changed: {}", report.atoms_changed);
    println!("merged:        {}", report.merged);
    if report.conflicts.is_empty() {
        println!("conflicts:     none");
    } else {
        println!("conflicts:");
        for conflict in &report.conflicts {
            println!("  - {conflict:?}");
        }
    }
    if !report.rejected_bonds.is_empty() {
        println!("rejected bonds (merging would have created a cycle):");
        for rejected in &report.rejected_bonds {
            let path = rejected.cycle.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> ");
            println!(
                "  - {} {} -> {}: {path}",
                rejected.bond.dependency_type, rejected.bond.source_id, rejected.bond.target_id
            );
        }
    }

    ctx.repo.reload()?;

    // Gated on `args.push` alone, not `report.merged`: `merged` is false
    // both when nothing changed and when the remote branch doesn't exist
    // yet (the very first publish), and the latter must still be able to
    // push. `commit_all`/`push` are no-ops when there's genuinely nothing
    // new to send.
    if args.push {
        if let Some(oid) = ctx.git.commit_all(&ctx.root, "eluent sync")? {
            println!("[OK] committed {oid}");
        }
        let branch = ctx
            .git
            .current_branch(&ctx.root)?
            .ok_or_else(|| anyhow::anyhow!("HEAD is detached; cannot push"))?;
        let refname = RefName::branch(&branch);
        match ctx.git.push("origin", &refname, &refname, ctx.network_timeout())? {
            PushOutcome::Accepted => println!("[OK] pushed {branch}"),
            PushOutcome::Rejected => println!("[WARN] push rejected (non-fast-forward); run sync again"),
        }
    }
    Ok(())
}
