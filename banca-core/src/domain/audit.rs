//! Audit trail domain model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of mutation recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CREATE" => Ok(AuditAction::Create),
            "UPDATE" => Ok(AuditAction::Update),
            "DELETE" => Ok(AuditAction::Delete),
            other => Err(format!("unknown audit action: {}", other)),
        }
    }
}

/// Entity names written to the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Account,
    AccountType,
    Client,
    RfidCard,
    Role,
    ServicePayment,
    ServiceType,
    Transfer,
    User,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "Account",
            EntityKind::AccountType => "AccountType",
            EntityKind::Client => "Client",
            EntityKind::RfidCard => "RfidCard",
            EntityKind::Role => "Role",
            EntityKind::ServicePayment => "ServicePayment",
            EntityKind::ServiceType => "ServiceType",
            EntityKind::Transfer => "Transfer",
            EntityKind::User => "User",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    /// Case-insensitive; accepts the stored names ("RfidCard") and
    /// snake/kebab spellings ("rfid_card", "service-type")
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .trim()
            .chars()
            .filter(|c| !matches!(c, '_' | '-'))
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "account" => Ok(EntityKind::Account),
            "accounttype" => Ok(EntityKind::AccountType),
            "client" => Ok(EntityKind::Client),
            "rfidcard" | "card" => Ok(EntityKind::RfidCard),
            "role" => Ok(EntityKind::Role),
            "servicepayment" | "payment" => Ok(EntityKind::ServicePayment),
            "servicetype" => Ok(EntityKind::ServiceType),
            "transfer" => Ok(EntityKind::Transfer),
            "user" => Ok(EntityKind::User),
            _ => Err(format!("unknown entity: {}", s.trim())),
        }
    }
}

/// One append-only record of a mutating action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub entity: String,
    pub entity_id: Uuid,
    pub user_id: Uuid,
}

impl AuditEntry {
    pub fn new(action: AuditAction, entity: EntityKind, entity_id: Uuid, user_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            entity: entity.as_str().to_string(),
            entity_id,
            user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trips_through_text() {
        for action in [AuditAction::Create, AuditAction::Update, AuditAction::Delete] {
            assert_eq!(action.as_str().parse::<AuditAction>().unwrap(), action);
        }
        assert!("archive".parse::<AuditAction>().is_err());
    }

    #[test]
    fn test_action_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&AuditAction::Create).unwrap(), "\"CREATE\"");
    }

    #[test]
    fn test_entry_records_entity_name() {
        let entry = AuditEntry::new(
            AuditAction::Create,
            EntityKind::Transfer,
            Uuid::new_v4(),
            Uuid::new_v4(),
        );
        assert_eq!(entry.entity, "Transfer");
    }

    #[test]
    fn test_entity_kind_parses_loose_spellings() {
        assert_eq!("RfidCard".parse::<EntityKind>().unwrap(), EntityKind::RfidCard);
        assert_eq!("service-type".parse::<EntityKind>().unwrap(), EntityKind::ServiceType);
        assert_eq!("account_type".parse::<EntityKind>().unwrap(), EntityKind::AccountType);
        assert!("ledger".parse::<EntityKind>().is_err());
    }
}
