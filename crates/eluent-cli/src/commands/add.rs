use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use eluent_core::model::types::AtomId;
use eluent_core::model::{Atom, Priority};
use eluent_core::repo::FileClass;

use crate::context::Context;
use crate::output;

#[derive(Args)]
pub struct AddArgs {
    /// Title of the new atom.
    title: String,

    /// Issue type. Defaults to `defaults.issue_type` in `config.yaml`.
    #[arg(long)]
    issue_type: Option<String>,

    /// Priority, 0 (highest) to 4 (lowest). Defaults to
    /// `defaults.priority` in `config.yaml`.
    #[arg(long)]
    priority: Option<u8>,

    /// Parent atom, by ID or short prefix.
    #[arg(long)]
    parent: Option<String>,

    /// Labels, may be repeated.
    #[arg(long = "label")]
    labels: Vec<String>,

    /// Assignee.
    #[arg(long)]
    assignee: Option<String>,

    /// Creator recorded on the atom.
    #[arg(long)]
    creator: Option<String>,

    /// Store this atom in `ephemeral.jsonl` (local-only, never synced).
    #[arg(long)]
    ephemeral: bool,
}

pub fn run(cwd: &Path, args: AddArgs) -> Result<()> {
    let mut ctx = Context::discover(cwd)?;

    let issue_type = match &args.issue_type {
        Some(raw) => raw.parse().map_err(|e| anyhow::anyhow!("--issue-type: {e}"))?,
        None => ctx
            .config
            .defaults
            .issue_type()
            .map_err(|e| anyhow::anyhow!(e))?,
    };
    let priority = match args.priority {
        Some(raw) => Priority::new(raw)?,
        None => ctx.config.defaults.priority().map_err(|e| anyhow::anyhow!(e))?,
    };
    let parent_id: Option<AtomId> = args.parent.as_deref().map(|p| ctx.resolve(p)).transpose()?;

    let id = AtomId::generate(ctx.repo_name().clone());
    let mut atom = Atom::new(id, &args.title, issue_type, Utc::now())?;
    atom.priority = priority;
    atom.parent_id = parent_id;
    atom.assignee = args.assignee;
    atom.creator = args.creator;
    atom.labels = args.labels.into_iter().collect();

    let file = if args.ephemeral { FileClass::Ephemeral } else { FileClass::Primary };
    let created = ctx.repo.create_atom(atom, file)?;
    output::print_atom_line(&created);
    Ok(())
}
