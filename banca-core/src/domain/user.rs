//! Staff users, their roles, and the acting-user context

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A staff member allowed to operate the system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    /// Argon2id hash; never leaves the process
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role_id: Uuid,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: impl Into<String>, password_hash: String, role_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            username: Self::normalize_username(&username.into()),
            password_hash,
            role_id,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Usernames are case-insensitive
    pub fn normalize_username(username: &str) -> String {
        username.trim().to_lowercase()
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.username.is_empty() {
            return Err("username cannot be empty");
        }
        if self.username.chars().any(char::is_whitespace) {
            return Err("username cannot contain whitespace");
        }
        Ok(())
    }
}

/// A named permission group (teller, supervisor, admin, ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

impl Role {
    pub fn new(name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into().trim().to_string(),
            description,
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        if self.name.is_empty() {
            return Err("role name cannot be empty");
        }
        Ok(())
    }
}

/// The user on whose behalf a mutating operation runs
///
/// Passed explicitly to every service call that writes, and recorded in
/// the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: Uuid,
}

impl Actor {
    pub fn new(user_id: Uuid) -> Self {
        Self { user_id }
    }
}
