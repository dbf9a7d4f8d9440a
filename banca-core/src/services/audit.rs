//! Audit service - reading and exporting the audit trail

use std::io::Write;
use std::sync::Arc;

use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::domain::{Actor, AuditAction, AuditEntry, EntityKind};
use crate::ports::AuditRecorder;

/// Append an audit entry after the change it describes has committed
///
/// The change already happened, so a failed append must not undo it or be
/// reported as the operation failing. The failure is logged at `warn`.
pub fn record_best_effort<R: AuditRecorder + ?Sized>(
    recorder: &R,
    action: AuditAction,
    entity: EntityKind,
    entity_id: Uuid,
    actor: &Actor,
) -> Option<AuditEntry> {
    match recorder.append(action, entity, entity_id, actor.user_id) {
        Ok(entry) => Some(entry),
        Err(e) => {
            tracing::warn!(
                action = action.as_str(),
                entity = entity.as_str(),
                %entity_id,
                "audit append failed: {}",
                e
            );
            None
        }
    }
}

/// Read side of the audit trail
pub struct AuditService {
    repository: Arc<DuckDbRepository>,
}

impl AuditService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Entries newest first, optionally for one entity kind and capped at `limit`
    pub fn list(&self, entity: Option<&str>, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        let entity = entity.map(str::trim).filter(|e| !e.is_empty());
        self.repository.list_audits(entity, limit)
    }

    /// Full history of one entity, oldest first
    pub fn list_for_entity(&self, entity: EntityKind, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
        self.repository
            .list_audits_for_entity(entity.as_str(), entity_id)
    }

    /// Write entries as CSV (header included) and return how many were written
    pub fn export_csv<W: Write>(
        &self,
        writer: W,
        entity: Option<&str>,
        limit: Option<usize>,
    ) -> Result<usize> {
        let entries = self.list(entity, limit)?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "timestamp", "action", "entity", "entity_id", "user_id"])?;
        for entry in &entries {
            csv_writer.write_record([
                entry.id.to_string(),
                entry.timestamp.to_rfc3339(),
                entry.action.to_string(),
                entry.entity.clone(),
                entry.entity_id.to_string(),
                entry.user_id.to_string(),
            ])?;
        }
        csv_writer.flush()?;

        Ok(entries.len())
    }
}
