//! Audit recorder port - append-only log of mutating actions

use uuid::Uuid;

use crate::domain::result::Result;
use crate::domain::{AuditAction, AuditEntry, EntityKind};

/// Append-only audit trail
///
/// Appends made through this trait run in their own statement, after the
/// change they describe has committed. Callers decide whether a failed
/// append matters (see `services::audit::record_best_effort`).
pub trait AuditRecorder: Send + Sync {
    /// Record one action and return the stored entry
    fn append(
        &self,
        action: AuditAction,
        entity: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
    ) -> Result<AuditEntry>;
}
