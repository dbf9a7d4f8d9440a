//! Client service - bank customers

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Actor, AuditAction, Client, EntityKind};
use crate::services::audit::record_best_effort;

/// Client fields accepted on create and update
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientInput {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile: Option<String>,
}

impl ClientInput {
    fn apply_to(self, client: &mut Client) {
        client.first_name = self.first_name.trim().to_string();
        client.last_name = self.last_name.trim().to_string();
        client.address = non_blank(self.address);
        client.phone = non_blank(self.phone);
        client.email = Client::normalize_email(self.email.as_deref());
        client.profile = non_blank(self.profile);
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub struct ClientService {
    repository: Arc<DuckDbRepository>,
}

impl ClientService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    pub fn list(&self) -> Result<Vec<Client>> {
        self.repository.list_clients()
    }

    pub fn get(&self, id: Uuid) -> Result<Client> {
        self.repository
            .get_client(id)?
            .ok_or_else(|| Error::not_found(format!("client {}", id)))
    }

    pub fn create(&self, input: ClientInput, actor: &Actor) -> Result<Client> {
        let mut client = Client::new("", "");
        input.apply_to(&mut client);
        client.validate().map_err(Error::validation)?;

        self.repository.insert_client(&client)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Create,
            EntityKind::Client,
            client.id,
            actor,
        );
        Ok(client)
    }

    pub fn update(&self, id: Uuid, input: ClientInput, actor: &Actor) -> Result<Client> {
        let mut client = self.get(id)?;
        input.apply_to(&mut client);
        client.validate().map_err(Error::validation)?;
        client.updated_at = Utc::now();

        self.repository.update_client(&client)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Update,
            EntityKind::Client,
            client.id,
            actor,
        );
        Ok(client)
    }

    pub fn deactivate(&self, id: Uuid, actor: &Actor) -> Result<Client> {
        self.set_active(id, false, actor)
    }

    pub fn activate(&self, id: Uuid, actor: &Actor) -> Result<Client> {
        self.set_active(id, true, actor)
    }

    fn set_active(&self, id: Uuid, active: bool, actor: &Actor) -> Result<Client> {
        self.repository.set_client_active(id, active)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Update,
            EntityKind::Client,
            id,
            actor,
        );
        self.get(id)
    }
}
