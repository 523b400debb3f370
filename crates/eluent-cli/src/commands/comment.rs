use std::path::Path;

use anyhow::Result;
use clap::{Args, Subcommand};

use crate::context::Context;

#[derive(Subcommand)]
pub enum CommentCommand {
    /// Attach a comment to an atom.
    Add(AddArgs),
}

#[derive(Args)]
pub struct AddArgs {
    /// Atom ID or unique prefix.
    id: String,
    /// Who is writing the comment.
    #[arg(long)]
    author: String,
    /// Comment text.
    #[arg(long)]
    content: String,
}

pub fn run(cwd: &Path, action: CommentCommand) -> Result<()> {
    let CommentCommand::Add(args) = action;
    let mut ctx = Context::discover(cwd)?;
    let id = ctx.resolve(&args.id)?;
    let comment = ctx.repo.add_comment(id, args.author, &args.content)?;
    println!("{}", comment.id);
    Ok(())
}
