//! RFID card domain model

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn card_number_regex() -> &'static Regex {
    static CARD: OnceLock<Regex> = OnceLock::new();
    CARD.get_or_init(|| Regex::new(r"^[0-9A-F]{4,32}$").expect("card pattern is valid"))
}

/// An RFID card linked to an account, used to pay services at a reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidCard {
    pub id: Uuid,
    /// Card UID as read by the scanner, uppercase hex
    pub card_number: String,
    pub account_id: Uuid,
    pub assigned_on: NaiveDate,
    pub active: bool,
}

impl RfidCard {
    /// Create a new active card assignment
    pub fn new(card_number: &str, account_id: Uuid, assigned_on: NaiveDate) -> Self {
        Self {
            id: Uuid::new_v4(),
            card_number: Self::normalize_number(card_number),
            account_id,
            assigned_on,
            active: true,
        }
    }

    /// Scanners report UIDs with mixed case and separators ("04:a2:1b:9c");
    /// keep only the hex digits, uppercased.
    pub fn normalize_number(card_number: &str) -> String {
        card_number
            .chars()
            .filter(|c| !matches!(c, ':' | '-' | ' '))
            .collect::<String>()
            .to_uppercase()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if !card_number_regex().is_match(&self.card_number) {
            return Err("card number must be 4 to 32 hexadecimal digits");
        }
        Ok(())
    }
}
