//! Banca CLI - bank administration in your terminal

use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{accounts, audit, logs, status, transfer};

/// Banca - bank administration in your terminal
#[derive(Parser)]
#[command(name = "banca", version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show ledger totals and database location
    Status,

    /// List accounts with owner, type and balance
    Accounts {
        /// Only active accounts
        #[arg(long)]
        active: bool,
    },

    /// Create and list transfers
    Transfer {
        #[command(subcommand)]
        command: transfer::TransferCommands,
    },

    /// Browse and export the audit trail
    Audit {
        #[command(subcommand)]
        command: audit::AuditCommands,
    },

    /// View and manage the operational event log
    Logs {
        #[command(subcommand)]
        command: logs::LogsCommands,
    },
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Status => "status",
            Commands::Accounts { .. } => "accounts",
            Commands::Transfer { .. } => "transfer",
            Commands::Audit { .. } => "audit",
            Commands::Logs { .. } => "logs",
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let logger = commands::get_logger();
    if let Some(logger) = &logger {
        let _ = logger.log_command(cli.command.name());
    }
    // Released so `banca logs` can open the log database itself
    drop(logger);

    let result = run(cli);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            output::error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let json = cli.json;
    match cli.command {
        Commands::Status => status::run(json),
        Commands::Accounts { active } => accounts::run(active, json),
        Commands::Transfer { command } => transfer::run(command, json),
        Commands::Audit { command } => audit::run(command, json),
        Commands::Logs { command } => logs::run(command, json),
    }
}
