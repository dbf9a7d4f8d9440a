//! Audit command - browse and export the audit trail

use std::fs::File;
use std::io::{self, BufWriter};
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Subcommand;
use uuid::Uuid;

use banca_core::{AuditEntry, EntityKind};

use super::{get_context, print_json};
use crate::output::{self, create_table};

#[derive(Subcommand)]
pub enum AuditCommands {
    /// Show recent audit entries, newest first
    List {
        /// Only entries for this entity kind (Client, Account, Transfer, ...)
        #[arg(long)]
        entity: Option<String>,
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
    },
    /// Full history of one record, oldest first
    History {
        /// Entity kind (Client, Account, RfidCard, ...)
        entity: String,
        /// Record ID
        id: Uuid,
    },
    /// Export entries as CSV
    Export {
        /// Output file (stdout when omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Only entries for this entity kind
        #[arg(long)]
        entity: Option<String>,
        /// Maximum number of entries
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

pub fn run(command: AuditCommands, json: bool) -> Result<()> {
    let ctx = get_context()?;

    match command {
        AuditCommands::List { entity, limit } => {
            let entries = ctx.audit_service.list(entity.as_deref(), Some(limit))?;
            show(&entries, json)
        }
        AuditCommands::History { entity, id } => {
            let kind: EntityKind = entity.parse().map_err(|e: String| anyhow!(e))?;
            let entries = ctx.audit_service.list_for_entity(kind, id)?;
            show(&entries, json)
        }
        AuditCommands::Export {
            output: path,
            entity,
            limit,
        } => {
            let written = match &path {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("Failed to create {}", path.display()))?;
                    ctx.audit_service
                        .export_csv(BufWriter::new(file), entity.as_deref(), limit)?
                }
                None => ctx
                    .audit_service
                    .export_csv(io::stdout().lock(), entity.as_deref(), limit)?,
            };

            if let Some(path) = path {
                if json {
                    println!(
                        "{}",
                        serde_json::json!({ "exported": written, "path": path.to_string_lossy() })
                    );
                } else {
                    output::success(&format!("Exported {} entries to {}", written, path.display()));
                }
            }
            Ok(())
        }
    }
}

fn show(entries: &[AuditEntry], json: bool) -> Result<()> {
    if json {
        return print_json(&entries);
    }

    if entries.is_empty() {
        output::info("No audit entries found.");
        return Ok(());
    }

    let mut table = create_table();
    table.set_header(vec!["Time", "Action", "Entity", "Entity ID", "User"]);
    for entry in entries {
        table.add_row(vec![
            entry.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            entry.action.to_string(),
            entry.entity.clone(),
            entry.entity_id.to_string(),
            entry.user_id.to_string(),
        ]);
    }
    println!("{}", table);
    Ok(())
}
