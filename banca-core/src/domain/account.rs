//! Account domain model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A balance-holding account belonging to a client
///
/// Inactive accounts keep their balance but are not eligible for
/// transfers or service payments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: Uuid,
    /// Human-facing account number, unique across the bank
    pub number: String,
    pub client_id: Uuid,
    pub account_type_id: Uuid,
    /// Never negative; enforced again by a CHECK constraint in the schema
    pub balance: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create a new active account with the given opening balance
    pub fn new(
        number: impl Into<String>,
        client_id: Uuid,
        account_type_id: Uuid,
        balance: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            number: Self::normalize_number(&number.into()),
            client_id,
            account_type_id,
            balance,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Account numbers are compared without surrounding whitespace
    pub fn normalize_number(number: &str) -> String {
        number.trim().to_string()
    }

    /// Validate account data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.number.trim().is_empty() {
            return Err("account number cannot be empty");
        }
        if self.balance < Decimal::ZERO {
            return Err("balance cannot be negative");
        }
        if self.balance.normalize().scale() > super::money::MONEY_SCALE {
            return Err("balance cannot have more than two decimal places");
        }
        if self.balance > super::money::MAX_MONEY {
            return Err("balance exceeds the largest amount an account can hold");
        }
        Ok(())
    }

    /// Whether this account can cover a debit of `amount`
    pub fn can_cover(&self, amount: Decimal) -> bool {
        self.balance >= amount
    }
}

/// Account joined with its owner and type names, for listings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountView {
    pub id: Uuid,
    pub number: String,
    pub client_id: Uuid,
    pub client_name: String,
    pub account_type_id: Uuid,
    pub account_type_name: String,
    pub balance: Decimal,
    pub active: bool,
}
