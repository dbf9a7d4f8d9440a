//! Accounts command - list accounts with owner and balance

use anyhow::Result;
use colored::Colorize;

use super::{get_context, print_json};
use crate::output::{create_table, format_money, money_cell};

pub fn run(active_only: bool, json: bool) -> Result<()> {
    let ctx = get_context()?;
    let accounts = if active_only {
        ctx.account_service.list_active()?
    } else {
        ctx.account_service.list()?
    };

    if json {
        return print_json(&accounts);
    }

    if accounts.is_empty() {
        println!("No accounts found.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Number", "Client", "Type", "Balance", "Status", "ID"]);

    for account in &accounts {
        let status = if account.active {
            "active".green().to_string()
        } else {
            "inactive".dimmed().to_string()
        };
        table.add_row(vec![
            account.number.clone().into(),
            account.client_name.clone().into(),
            account.account_type_name.clone().into(),
            money_cell(account.balance),
            status.into(),
            account.id.to_string().into(),
        ]);
    }

    println!("{}", table);

    let total = accounts.iter().map(|a| a.balance).sum();
    println!("{} accounts, total balance {}", accounts.len(), format_money(total));

    Ok(())
}
