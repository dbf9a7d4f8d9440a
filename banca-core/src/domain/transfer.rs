//! Transfer domain model and its rejection taxonomy

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::money::is_valid_amount;
use super::result::Error;

/// A committed movement of funds between two accounts
///
/// Immutable once written; exactly one row per successful request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: Uuid,
    /// When the transfer was ordered (supplied by the caller)
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub source_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub authorizing_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Transfer with both sides' account numbers and owner names, for history
/// listings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferView {
    #[serde(flatten)]
    pub transfer: Transfer,
    pub source_account_number: String,
    pub source_client_name: String,
    pub destination_account_number: String,
    pub destination_client_name: String,
}

/// Incoming transfer request; every field is optional so that absent
/// fields can be reported together instead of failing deserialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TransferRequest {
    pub timestamp: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub source_account_id: Option<Uuid>,
    pub destination_account_id: Option<Uuid>,
    pub authorizing_user_id: Option<Uuid>,
}

/// A request that passed the checks needing no account data
#[derive(Debug, Clone, PartialEq)]
pub struct TransferOrder {
    pub timestamp: DateTime<Utc>,
    pub amount: Decimal,
    pub source_account_id: Uuid,
    pub destination_account_id: Uuid,
    pub authorizing_user_id: Uuid,
}

impl TransferRequest {
    /// Presence and same-account checks, in that order
    pub fn into_order(self) -> Result<TransferOrder, TransferError> {
        let mut missing = Vec::new();
        if self.timestamp.is_none() {
            missing.push("timestamp");
        }
        if self.amount.is_none() {
            missing.push("amount");
        }
        if self.source_account_id.is_none() {
            missing.push("source_account_id");
        }
        if self.destination_account_id.is_none() {
            missing.push("destination_account_id");
        }
        if self.authorizing_user_id.is_none() {
            missing.push("authorizing_user_id");
        }

        match (
            self.timestamp,
            self.amount,
            self.source_account_id,
            self.destination_account_id,
            self.authorizing_user_id,
        ) {
            (Some(timestamp), Some(amount), Some(source), Some(destination), Some(user)) => {
                if source == destination {
                    return Err(TransferError::SameAccount);
                }
                Ok(TransferOrder {
                    timestamp,
                    amount,
                    source_account_id: source,
                    destination_account_id: destination,
                    authorizing_user_id: user,
                })
            }
            _ => Err(TransferError::MissingFields(missing)),
        }
    }
}

impl TransferOrder {
    pub fn amount_is_valid(&self) -> bool {
        is_valid_amount(self.amount)
    }

    /// Build the record persisted on success
    pub fn into_transfer(self) -> Transfer {
        Transfer {
            id: Uuid::new_v4(),
            timestamp: self.timestamp,
            amount: self.amount,
            source_account_id: self.source_account_id,
            destination_account_id: self.destination_account_id,
            authorizing_user_id: self.authorizing_user_id,
            created_at: Utc::now(),
        }
    }
}

/// Why a transfer did not happen
///
/// Every variant except `Persistence` is a caller-fixable rejection that
/// left no trace in the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransferError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Source and destination accounts must be different")]
    SameAccount,

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Transfer amount must be greater than zero with at most two decimal places")]
    InvalidAmount,

    #[error("Account is inactive: {0}")]
    InactiveAccount(Uuid),

    #[error("Insufficient funds in account {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        account_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Account {0} cannot hold a larger balance")]
    BalanceLimitExceeded(Uuid),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl TransferError {
    /// Stable machine-readable code for API clients
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::SameAccount => "SAME_ACCOUNT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InactiveAccount(_) => "INACTIVE_ACCOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::BalanceLimitExceeded(_) => "BALANCE_LIMIT_EXCEEDED",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// True for rejections the caller can fix by changing the request
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl From<Error> for TransferError {
    fn from(err: Error) -> Self {
        Self::Persistence(err.to_string())
    }
}
