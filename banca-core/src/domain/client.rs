//! Client domain model

use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

fn email_regex() -> &'static Regex {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is valid")
    })
}

/// A bank customer who owns accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    /// Free-form customer profile, e.g. "personal" or "business"
    pub profile: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    /// Create a new active client
    pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            first_name: first_name.into().trim().to_string(),
            last_name: last_name.into().trim().to_string(),
            address: None,
            phone: None,
            email: None,
            profile: None,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// "First Last", as shown in account listings
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Lowercase and trim an email address; empty strings become None
    pub fn normalize_email(email: Option<&str>) -> Option<String> {
        email
            .map(|e| e.trim().to_lowercase())
            .filter(|e| !e.is_empty())
    }

    /// Validate client data
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.first_name.trim().is_empty() {
            return Err("first name cannot be empty");
        }
        if self.last_name.trim().is_empty() {
            return Err("last name cannot be empty");
        }
        if let Some(email) = &self.email {
            if !email_regex().is_match(email) {
                return Err("email address is not valid");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        let client = Client::new(" Ana ", "Pérez");
        assert_eq!(client.full_name(), "Ana Pérez");
    }

    #[test]
    fn test_email_normalization() {
        assert_eq!(
            Client::normalize_email(Some(" Ana@Example.COM ")),
            Some("ana@example.com".to_string())
        );
        assert_eq!(Client::normalize_email(Some("   ")), None);
        assert_eq!(Client::normalize_email(None), None);
    }

    #[test]
    fn test_client_validation() {
        let mut client = Client::new("Ana", "Pérez");
        assert!(client.validate().is_ok());

        client.email = Some("not-an-email".to_string());
        assert!(client.validate().is_err());

        client.email = Some("ana@example.com".to_string());
        assert!(client.validate().is_ok());

        client.last_name = String::new();
        assert!(client.validate().is_err());
    }
}
