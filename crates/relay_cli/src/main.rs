//! Relay CLI
//!
//! Command-line tools for applying and inspecting file transactions.
//!
//! # Commands
//!
//! - `apply` - Apply one or more transaction batches from JSON files
//! - `log` - List committed transactions, newest first
//! - `show` - Display a single transaction
//! - `revert` - Undo a committed transaction
//!
//! Settings come from `relay.config.json` in the project directory, or from
//! the file given with `--config`.

mod commands;
mod prompt;
mod settings;

use clap::{Parser, Subcommand, ValueEnum};
use relay_core::ApprovalMode;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Transactional file changes with snapshot and rollback.
#[derive(Parser)]
#[command(name = "relay")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the project directory
    #[arg(global = true, short, long, default_value = ".")]
    path: PathBuf,

    /// Path to a JSON configuration file
    #[arg(global = true, short, long)]
    config: Option<PathBuf>,

    /// Override the configured project id
    #[arg(global = true, long)]
    project_id: Option<String>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum ApprovalArg {
    Auto,
    Manual,
}

impl From<ApprovalArg> for ApprovalMode {
    fn from(arg: ApprovalArg) -> Self {
        match arg {
            ApprovalArg::Auto => ApprovalMode::Auto,
            ApprovalArg::Manual => ApprovalMode::Manual,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply transaction batches read from JSON files ("-" for stdin)
    Apply {
        /// Batch files, processed in order
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Approve every batch without asking
        #[arg(short, long)]
        yes: bool,

        /// Override the configured approval mode
        #[arg(long, value_enum)]
        approval: Option<ApprovalArg>,
    },

    /// List committed transactions, newest first
    Log {
        /// Maximum number of transactions to list
        #[arg(short, long)]
        limit: Option<usize>,

        /// Include reverts and the transactions they undid
        #[arg(long)]
        include_reverts: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Display a transaction by id or recency index
    Show {
        /// Transaction id, or 1 for the latest
        #[arg(default_value = "1")]
        identifier: String,

        /// Count reverts when resolving an index
        #[arg(long)]
        include_reverts: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Revert a committed transaction
    Revert {
        /// Transaction id, or 1 for the latest
        #[arg(default_value = "1")]
        identifier: String,

        /// Count reverts when resolving an index
        #[arg(long)]
        include_reverts: bool,

        /// Skip confirmation and approve the revert
        #[arg(short, long)]
        yes: bool,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let load = || settings::load(&cli.path, cli.config.as_deref(), cli.project_id.as_deref());

    match &cli.command {
        Commands::Apply {
            files,
            yes,
            approval,
        } => {
            let mut config = load()?;
            if let Some(mode) = approval {
                config = config.approval_mode((*mode).into());
            }
            commands::apply::run(&cli.path, config, files, *yes).await?;
        }
        Commands::Log {
            limit,
            include_reverts,
            format,
        } => {
            commands::log::run(&cli.path, *limit, *include_reverts, format)?;
        }
        Commands::Show {
            identifier,
            include_reverts,
            format,
        } => {
            commands::show::run(&cli.path, identifier, *include_reverts, format)?;
        }
        Commands::Revert {
            identifier,
            include_reverts,
            yes,
        } => {
            commands::revert::run(&cli.path, load()?, identifier, *include_reverts, *yes).await?;
        }
        Commands::Version => {
            println!("Relay CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Relay Core v{}", relay_core::VERSION);
        }
    }

    Ok(())
}
