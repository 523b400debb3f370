use std::path::Path;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, ValueEnum};
use eluent_core::model::Priority;
use eluent_core::readiness::{self, LabelMatch, ReadinessFilter, SortPolicy};

use crate::context::Context;
use crate::output;

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum SortArg {
    #[default]
    Priority,
    Oldest,
    Hybrid,
}

#[derive(Clone, Copy, Default, ValueEnum)]
pub enum LabelMatchArg {
    #[default]
    All,
    Any,
}

#[derive(Args)]
pub struct ReadyArgs {
    /// Restrict to this exact priority (0..4).
    #[arg(long)]
    priority: Option<u8>,

    /// Restrict to this assignee.
    #[arg(long)]
    assignee: Option<String>,

    /// Labels to match, may be repeated.
    #[arg(long = "label")]
    labels: Vec<String>,

    /// How `--label` values combine.
    #[arg(long, value_enum, default_value = "all")]
    label_match: LabelMatchArg,

    /// Restrict to the subtree rooted at this atom.
    #[arg(long)]
    parent: Option<String>,

    /// Include abstract atoms (epics, formulas).
    #[arg(long)]
    include_abstract: bool,

    /// Cap the number of results.
    #[arg(long)]
    limit: Option<usize>,

    /// Sort policy.
    #[arg(long, value_enum, default_value = "priority")]
    sort: SortArg,
}

pub fn run(cwd: &Path, args: ReadyArgs) -> Result<()> {
    let ctx = Context::discover(cwd)?;

    let filter = ReadinessFilter {
        priority: args.priority.map(Priority::new).transpose()?,
        assignee: args.assignee,
        labels: args.labels,
        label_match: match args.label_match {
            LabelMatchArg::All => LabelMatch::All,
            LabelMatchArg::Any => LabelMatch::Any,
        },
        parent_subtree: args.parent.as_deref().map(|p| ctx.resolve(p)).transpose()?,
        include_types: None,
        exclude_types: Default::default(),
        include_abstract: args.include_abstract,
        limit: args.limit,
    };
    let sort = match args.sort {
        SortArg::Priority => SortPolicy::Priority,
        SortArg::Oldest => SortPolicy::Oldest,
        SortArg::Hybrid => SortPolicy::Hybrid,
    };

    let ids = readiness::ready(ctx.repo.index(), Utc::now(), &filter, sort);
    for id in ids {
        if let Some(atom) = ctx.repo.index().find_by_id(&id) {
            output::print_atom_line(atom);
        }
    }
    Ok(())
}
