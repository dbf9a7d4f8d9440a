//! Catalog entries: account types and service types
//!
//! Both are simple named lookups referenced by accounts and payments.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of account a client can open (savings, checking, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl AccountType {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("account type name cannot be empty");
        }
        Ok(())
    }
}

/// A payable service (electricity, water, phone, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl ServiceType {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("service type name cannot be empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_are_trimmed() {
        let kind = AccountType::new("  Savings ", None);
        assert_eq!(kind.name, "Savings");
        assert!(kind.validate().is_ok());

        let service = ServiceType::new("   ", None);
        assert!(service.validate().is_err());
    }
}
