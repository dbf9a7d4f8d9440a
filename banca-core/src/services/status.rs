//! Status service - summary counts for dashboards and `banca status`

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;

/// Status service for system summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        let counts = self.repository.table_counts()?;

        Ok(StatusSummary {
            total_clients: counts.clients,
            total_accounts: counts.accounts,
            active_accounts: counts.active_accounts,
            total_balance: counts.total_balance,
            total_transfers: counts.transfers,
            total_payments: counts.payments,
            total_audit_entries: counts.audit_entries,
            database_path: self.repository.db_path().display().to_string(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_clients: i64,
    pub total_accounts: i64,
    pub active_accounts: i64,
    pub total_balance: Decimal,
    pub total_transfers: i64,
    pub total_payments: i64,
    pub total_audit_entries: i64,
    pub database_path: String,
}
