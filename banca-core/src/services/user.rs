//! User service - roles, staff users and login

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Actor, AuditAction, EntityKind, Role, User};
use crate::services::audit::record_best_effort;
use crate::services::password::{hash_password, verify_password};

/// Fields accepted when creating or updating a role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Fields accepted when creating a user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub role_id: Uuid,
}

/// Partial user update; omitted fields keep their value
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserUpdate {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub role_id: Option<Uuid>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub struct UserService {
    repository: Arc<DuckDbRepository>,
}

impl UserService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    // === Roles ===

    pub fn list_roles(&self) -> Result<Vec<Role>> {
        self.repository.list_roles()
    }

    pub fn create_role(&self, input: RoleInput, actor: &Actor) -> Result<Role> {
        let role = Role::new(input.name, input.description);
        role.validate().map_err(Error::validation)?;

        self.repository.insert_role(&role)?;
        record_best_effort(self.repository.as_ref(), AuditAction::Create, EntityKind::Role, role.id, actor);
        Ok(role)
    }

    pub fn update_role(&self, id: Uuid, input: RoleInput, actor: &Actor) -> Result<Role> {
        if self.repository.get_role(id)?.is_none() {
            return Err(Error::not_found(format!("role {}", id)));
        }
        let role = Role {
            id,
            ..Role::new(input.name, input.description)
        };
        role.validate().map_err(Error::validation)?;

        self.repository.update_role(&role)?;
        record_best_effort(self.repository.as_ref(), AuditAction::Update, EntityKind::Role, id, actor);
        Ok(role)
    }

    // === Users ===

    pub fn list_users(&self) -> Result<Vec<User>> {
        self.repository.list_users()
    }

    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.repository
            .get_user(id)?
            .ok_or_else(|| Error::not_found(format!("user {}", id)))
    }

    pub fn create_user(&self, input: NewUser, actor: &Actor) -> Result<User> {
        self.check_role(input.role_id)?;
        let user = User::new(input.username, hash_password(&input.password)?, input.role_id);
        user.validate().map_err(Error::validation)?;

        self.repository.insert_user(&user)?;
        record_best_effort(self.repository.as_ref(), AuditAction::Create, EntityKind::User, user.id, actor);
        Ok(user)
    }

    pub fn update_user(&self, id: Uuid, input: UserUpdate, actor: &Actor) -> Result<User> {
        let mut user = self.get_user(id)?;

        if let Some(username) = input.username {
            user.username = User::normalize_username(&username);
        }
        if let Some(password) = input.password {
            user.password_hash = hash_password(&password)?;
        }
        if let Some(role_id) = input.role_id {
            if role_id != user.role_id {
                self.check_role(role_id)?;
            }
            user.role_id = role_id;
        }
        if let Some(active) = input.active {
            user.active = active;
        }
        user.validate().map_err(Error::validation)?;
        user.updated_at = Utc::now();

        self.repository.update_user(&user)?;
        record_best_effort(self.repository.as_ref(), AuditAction::Update, EntityKind::User, id, actor);
        Ok(user)
    }

    pub fn deactivate_user(&self, id: Uuid, actor: &Actor) -> Result<User> {
        self.update_user(
            id,
            UserUpdate {
                active: Some(false),
                ..Default::default()
            },
            actor,
        )
    }

    /// Return the user when the password matches and the account is active
    ///
    /// Unknown usernames, wrong passwords and inactive users all produce the
    /// same `Unauthorized` error.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<User> {
        let denied = || Error::unauthorized("invalid username or password");

        let user = self
            .repository
            .find_user_by_username(&User::normalize_username(username))?
            .ok_or_else(denied)?;
        if !user.active || !verify_password(password, &user.password_hash) {
            tracing::warn!(user_id = %user.id, "login rejected");
            return Err(denied());
        }
        Ok(user)
    }

    fn check_role(&self, role_id: Uuid) -> Result<()> {
        match self.repository.get_role(role_id)? {
            Some(_) => Ok(()),
            None => Err(Error::validation(format!("role {} does not exist", role_id))),
        }
    }
}
