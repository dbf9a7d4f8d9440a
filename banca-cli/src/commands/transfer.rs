//! Transfer command - move money between accounts and list transfers

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use rust_decimal::Decimal;
use uuid::Uuid;

use banca_core::services::LogEvent;
use banca_core::{OperationResult, Transfer, TransferError, TransferRequest, TransferView};

use super::{get_context, get_logger, log_event, print_json};
use crate::output::{self, create_table, money_cell};

#[derive(Subcommand)]
pub enum TransferCommands {
    /// Transfer funds from one account to another
    New {
        /// Source account ID
        #[arg(long)]
        from: Uuid,
        /// Destination account ID
        #[arg(long)]
        to: Uuid,
        /// Amount, at most two decimal places
        #[arg(long)]
        amount: Decimal,
        /// ID of the staff user authorizing the transfer
        #[arg(long, env = "BANCA_USER")]
        user: Uuid,
        /// When the transfer was ordered (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },
    /// List transfers, newest first
    List {
        /// Only transfers touching this account
        #[arg(long)]
        account: Option<Uuid>,
        /// Maximum number of rows
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

pub fn run(command: TransferCommands, json: bool) -> Result<()> {
    match command {
        TransferCommands::New {
            from,
            to,
            amount,
            user,
            at,
        } => create(
            TransferRequest {
                timestamp: Some(at.unwrap_or_else(Utc::now)),
                amount: Some(amount),
                source_account_id: Some(from),
                destination_account_id: Some(to),
                authorizing_user_id: Some(user),
            },
            json,
        ),
        TransferCommands::List { account, limit } => list(account, limit, json),
    }
}

fn create(request: TransferRequest, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let logger = get_logger();

    match ctx.transfer_service.create(request) {
        Ok(transfer) => {
            log_event(&logger, LogEvent::new("transfer_completed").with_command("transfer new"));
            if json {
                return print_json(&OperationResult::ok_with_message(transfer, "Transfer completed"));
            }
            output::success("Transfer completed");
            print_table(&[transfer]);
            Ok(())
        }
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("transfer_rejected")
                    .with_command("transfer new")
                    .with_error(e.code(), log_message(&e)),
            );
            if json {
                print_json(&OperationResult::<Transfer>::fail(e.code(), e.to_string()))?;
            }
            Err(anyhow!("{} ({})", e, e.code()))
        }
    }
}

/// Rejection text for the operational log, without amounts
fn log_message(err: &TransferError) -> String {
    match err {
        TransferError::InsufficientFunds { account_id, .. } => {
            format!("Insufficient funds in account {}", account_id)
        }
        other => other.to_string(),
    }
}

fn list(account: Option<Uuid>, limit: Option<usize>, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let mut transfers = match account {
        Some(id) => ctx.transfer_service.list_views_for_account(id)?,
        None => ctx.transfer_service.list_views()?,
    };
    if let Some(limit) = limit {
        transfers.truncate(limit);
    }

    if json {
        return print_json(&transfers);
    }

    if transfers.is_empty() {
        println!("No transfers found.");
        return Ok(());
    }

    print_history(&transfers);
    Ok(())
}

fn print_history(views: &[TransferView]) {
    let mut table = create_table();
    table.set_header(vec!["Ordered", "Amount", "From", "To", "ID"]);
    for view in views {
        let transfer = &view.transfer;
        table.add_row(vec![
            transfer.timestamp.format("%Y-%m-%d %H:%M").to_string().into(),
            money_cell(transfer.amount),
            format!("{} ({})", view.source_account_number, view.source_client_name).into(),
            format!("{} ({})", view.destination_account_number, view.destination_client_name)
                .into(),
            transfer.id.to_string().into(),
        ]);
    }
    println!("{}", table);
}

fn print_table(transfers: &[Transfer]) {
    let mut table = create_table();
    table.set_header(vec!["Ordered", "Amount", "From", "To", "Authorized by", "ID"]);
    for transfer in transfers {
        table.add_row(vec![
            transfer.timestamp.format("%Y-%m-%d %H:%M").to_string().into(),
            money_cell(transfer.amount),
            transfer.source_account_id.to_string().into(),
            transfer.destination_account_id.to_string().into(),
            transfer.authorizing_user_id.to_string().into(),
            transfer.id.to_string().into(),
        ]);
    }
    println!("{}", table);
}
