//! Service payment domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::result::Error;

/// A bill payment debited from an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePayment {
    pub id: Uuid,
    pub paid_at: DateTime<Utc>,
    pub amount: Decimal,
    pub account_id: Uuid,
    pub service_type_id: Uuid,
    /// Set when the payment was made by presenting an RFID card
    pub card_id: Option<Uuid>,
    pub authorizing_user_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Incoming payment request against an account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentRequest {
    pub paid_at: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub account_id: Option<Uuid>,
    pub service_type_id: Option<Uuid>,
    pub authorizing_user_id: Option<Uuid>,
}

/// Incoming payment request identified by a scanned card
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CardPaymentRequest {
    pub card_number: Option<String>,
    pub paid_at: Option<DateTime<Utc>>,
    pub amount: Option<Decimal>,
    pub service_type_id: Option<Uuid>,
    pub authorizing_user_id: Option<Uuid>,
}

/// Payment fields once presence has been checked
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentOrder {
    pub paid_at: DateTime<Utc>,
    pub amount: Decimal,
    pub service_type_id: Uuid,
    pub authorizing_user_id: Uuid,
}

impl PaymentOrder {
    pub fn into_payment(self, account_id: Uuid, card_id: Option<Uuid>) -> ServicePayment {
        ServicePayment {
            id: Uuid::new_v4(),
            paid_at: self.paid_at,
            amount: self.amount,
            account_id,
            service_type_id: self.service_type_id,
            card_id,
            authorizing_user_id: self.authorizing_user_id,
            created_at: Utc::now(),
        }
    }
}

fn collect_order(
    missing: &mut Vec<&'static str>,
    paid_at: Option<DateTime<Utc>>,
    amount: Option<Decimal>,
    service_type_id: Option<Uuid>,
    authorizing_user_id: Option<Uuid>,
) -> Option<PaymentOrder> {
    if paid_at.is_none() {
        missing.push("paid_at");
    }
    if amount.is_none() {
        missing.push("amount");
    }
    if service_type_id.is_none() {
        missing.push("service_type_id");
    }
    if authorizing_user_id.is_none() {
        missing.push("authorizing_user_id");
    }
    Some(PaymentOrder {
        paid_at: paid_at?,
        amount: amount?,
        service_type_id: service_type_id?,
        authorizing_user_id: authorizing_user_id?,
    })
}

impl PaymentRequest {
    /// Returns the target account and the order, or every missing field
    pub fn into_order(self) -> Result<(Uuid, PaymentOrder), PaymentError> {
        let mut missing = Vec::new();
        if self.account_id.is_none() {
            missing.push("account_id");
        }
        let order = collect_order(
            &mut missing,
            self.paid_at,
            self.amount,
            self.service_type_id,
            self.authorizing_user_id,
        );
        match (self.account_id, order) {
            (Some(account_id), Some(order)) => Ok((account_id, order)),
            _ => Err(PaymentError::MissingFields(missing)),
        }
    }
}

impl CardPaymentRequest {
    /// Returns the raw card number and the order, or every missing field
    pub fn into_order(self) -> Result<(String, PaymentOrder), PaymentError> {
        let mut missing = Vec::new();
        let card_number = self.card_number.filter(|n| !n.trim().is_empty());
        if card_number.is_none() {
            missing.push("card_number");
        }
        let order = collect_order(
            &mut missing,
            self.paid_at,
            self.amount,
            self.service_type_id,
            self.authorizing_user_id,
        );
        match (card_number, order) {
            (Some(card_number), Some(order)) => Ok((card_number, order)),
            _ => Err(PaymentError::MissingFields(missing)),
        }
    }
}

/// Why a payment did not happen
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PaymentError {
    #[error("Missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Service type not found: {0}")]
    ServiceTypeNotFound(Uuid),

    #[error("No card registered with number {0}")]
    CardNotFound(String),

    #[error("Card {0} is inactive")]
    InactiveCard(String),

    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    #[error("Payment amount must be greater than zero with at most two decimal places")]
    InvalidAmount,

    #[error("Account is inactive: {0}")]
    InactiveAccount(Uuid),

    #[error("Insufficient funds in account {account_id}: available {available}, requested {requested}")]
    InsufficientFunds {
        account_id: Uuid,
        available: Decimal,
        requested: Decimal,
    },

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl PaymentError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingFields(_) => "MISSING_FIELDS",
            Self::ServiceTypeNotFound(_) => "SERVICE_TYPE_NOT_FOUND",
            Self::CardNotFound(_) => "CARD_NOT_FOUND",
            Self::InactiveCard(_) => "INACTIVE_CARD",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::InactiveAccount(_) => "INACTIVE_ACCOUNT",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl From<Error> for PaymentError {
    fn from(err: Error) -> Self {
        Self::Persistence(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_request_reports_missing_fields() {
        let request = PaymentRequest {
            amount: Some(Decimal::new(2500, 2)),
            ..Default::default()
        };
        assert_eq!(
            request.into_order().unwrap_err(),
            PaymentError::MissingFields(vec![
                "account_id",
                "paid_at",
                "service_type_id",
                "authorizing_user_id"
            ])
        );
    }

    #[test]
    fn test_blank_card_number_counts_as_missing() {
        let request = CardPaymentRequest {
            card_number: Some("  ".to_string()),
            paid_at: Some(Utc::now()),
            amount: Some(Decimal::ONE),
            service_type_id: Some(Uuid::new_v4()),
            authorizing_user_id: Some(Uuid::new_v4()),
        };
        assert_eq!(
            request.into_order().unwrap_err(),
            PaymentError::MissingFields(vec!["card_number"])
        );
    }

    #[test]
    fn test_order_builds_payment() {
        let account_id = Uuid::new_v4();
        let request = PaymentRequest {
            paid_at: Some(Utc::now()),
            amount: Some(Decimal::new(4599, 2)),
            account_id: Some(account_id),
            service_type_id: Some(Uuid::new_v4()),
            authorizing_user_id: Some(Uuid::new_v4()),
        };
        let (target, order) = request.into_order().unwrap();
        let payment = order.into_payment(target, None);
        assert_eq!(payment.account_id, account_id);
        assert_eq!(payment.amount, Decimal::new(4599, 2));
        assert!(payment.card_id.is_none());
    }
}
