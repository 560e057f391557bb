//! Haushalt CLI - category automation for bank transactions

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{categorize, logs, new, rules, transactions};

/// Haushalt - rule-based transaction categorization
#[derive(Parser)]
#[command(name = "hh", version, about, long_about = None)]
struct Cli {
    /// Data directory (defaults to ~/.haushalt)
    #[arg(long, global = true, env = "HAUSHALT_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage category rules
    Rules {
        #[command(subcommand)]
        command: rules::RulesCommands,
    },

    /// Apply enabled rules to uncategorized transactions
    Categorize {
        /// Only transactions of this account
        #[arg(long)]
        account: Option<String>,
        /// Show what would change without saving
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Create new records
    New {
        #[command(subcommand)]
        command: new::NewCommands,
    },

    /// List transactions
    Transactions {
        /// Only transactions of this account
        #[arg(long)]
        account: Option<String>,
        /// Only transactions without a category
        #[arg(long)]
        uncategorized: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// View and manage the event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(dir) = cli.data_dir {
        // Every command resolves its directory through HAUSHALT_DIR
        std::env::set_var("HAUSHALT_DIR", dir);
    }

    match cli.command {
        Commands::Rules { command } => rules::run(command),
        Commands::Categorize { account, dry_run, json } => categorize::run(account, dry_run, json),
        Commands::New { command } => new::run(command),
        Commands::Transactions { account, uncategorized, json } => {
            transactions::run(account, uncategorized, json)
        }
        Commands::Logs { command } => logs::run(command),
    }
}
