//! Status command - show ledger summary

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::{get_context, print_json};
use crate::output::{format_money, format_size};

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        return print_json(&status);
    }

    println!("{}", "Bank Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Clients", &status.total_clients.to_string()]);
    table.add_row(vec![
        "Accounts",
        &format!("{} ({} active)", status.total_accounts, status.active_accounts),
    ]);
    table.add_row(vec!["Total balance", &format_money(status.total_balance)]);
    table.add_row(vec!["Transfers", &status.total_transfers.to_string()]);
    table.add_row(vec!["Service payments", &status.total_payments.to_string()]);
    table.add_row(vec!["Audit entries", &status.total_audit_entries.to_string()]);

    println!("{}", table);
    println!();

    let size = ctx.repository.get_db_size().map(format_size).unwrap_or_default();
    println!("Database: {} {}", status.database_path, size.dimmed());

    Ok(())
}
