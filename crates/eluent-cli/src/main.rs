//! `eluent`: a local-first, git-synchronised work-item tracker for
//! cooperating agents.

mod commands;
mod context;
mod output;
mod telemetry;

use clap::{Parser, Subcommand};

use telemetry::LogFormat;

#[derive(Parser)]
#[command(name = "eluent", version, about = "A git-synchronised DAG of work items")]
struct Cli {
    /// Log output format.
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a `.eluent/` directory in the current repository.
    Init(commands::init::InitArgs),
    /// Create a new atom.
    Add(commands::add::AddArgs),
    /// Show one atom in full, including its bonds and comments.
    Show(commands::show::ShowArgs),
    /// List atoms, optionally filtered.
    List(commands::list::ListArgs),
    /// List atoms that are ready to be claimed right now.
    Ready(commands::ready::ReadyArgs),
    /// Claim an atom for an agent.
    Claim(commands::claim::ClaimArgs),
    /// Release a previously claimed atom.
    Release(commands::claim::ReleaseArgs),
    /// Touch a claimed atom's `updated_at` without changing its state.
    Heartbeat(commands::claim::HeartbeatArgs),
    /// Close an atom.
    Close(commands::close::CloseArgs),
    /// Manage dependency bonds between atoms.
    Bond {
        #[command(subcommand)]
        action: commands::bond::BondCommand,
    },
    /// Add a comment to an atom.
    Comment {
        #[command(subcommand)]
        action: commands::comment::CommentCommand,
    },
    /// Pull-first sync against the remote.
    Sync(commands::sync::SyncArgs),
    /// Diagnose the local repository and claim ledger.
    Doctor,
}

fn main() {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("error: could not determine current directory: {err}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Init(args) => commands::init::run(&cwd, args),
        Commands::Add(args) => commands::add::run(&cwd, args),
        Commands::Show(args) => commands::show::run(&cwd, args),
        Commands::List(args) => commands::list::run(&cwd, args),
        Commands::Ready(args) => commands::ready::run(&cwd, args),
        Commands::Claim(args) => commands::claim::run_claim(&cwd, args),
        Commands::Release(args) => commands::claim::run_release(&cwd, args),
        Commands::Heartbeat(args) => commands::claim::run_heartbeat(&cwd, args),
        Commands::Close(args) => commands::close::run(&cwd, args),
        Commands::Bond { action } => commands::bond::run(&cwd, action),
        Commands::Comment { action } => commands::comment::run(&cwd, action),
        Commands::Sync(args) => commands::sync::run(&cwd, args),
        Commands::Doctor => commands::doctor::run(&cwd),
    };

    if let Err(err) = result {
        tracing::error!(error = %err, "command failed");
        eprintln!("error: {err:#}");
        std::process::exit(exit_code_for(&err));
    }
}

/// Maps a failure to the exit-code buckets: validation = 2, not-found = 3,
/// conflict = 4, git = 5, timeout = 7, anything else = 1.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    use eluent_core::EluentError;
    use eluent_git::GitError;

    if let Some(e) = err.downcast_ref::<EluentError>() {
        return match e {
            EluentError::Validation(_) | EluentError::BondCycle { .. } | EluentError::DanglingBond { .. } => 2,
            EluentError::AtomNotFound { .. } | EluentError::AmbiguousId { .. } => 3,
            EluentError::ClaimConflict { .. } | EluentError::MergeConflict { .. } | EluentError::RepoCorrupted { .. } => 4,
            EluentError::Git(GitError::Timeout { .. }) => 7,
            EluentError::Git(_) => 5,
            EluentError::Config { .. } | EluentError::Io(_) => 1,
        };
    }
    if let Some(e) = err.downcast_ref::<GitError>() {
        return if matches!(e, GitError::Timeout { .. }) { 7 } else { 5 };
    }
    1
}
