//! Catalog service - account types and service types

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{AccountType, Actor, AuditAction, EntityKind, ServiceType};
use crate::services::audit::record_best_effort;

/// Name and description of a catalog entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogInput {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

pub struct CatalogService {
    repository: Arc<DuckDbRepository>,
}

impl CatalogService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    // === Account types ===

    pub fn list_account_types(&self) -> Result<Vec<AccountType>> {
        self.repository.list_account_types()
    }

    pub fn create_account_type(&self, input: CatalogInput, actor: &Actor) -> Result<AccountType> {
        let account_type = AccountType::new(input.name, input.description);
        account_type.validate().map_err(Error::validation)?;

        self.repository.insert_account_type(&account_type)?;
        self.audit(AuditAction::Create, EntityKind::AccountType, account_type.id, actor);
        Ok(account_type)
    }

    pub fn update_account_type(
        &self,
        id: Uuid,
        input: CatalogInput,
        actor: &Actor,
    ) -> Result<AccountType> {
        if self.repository.get_account_type(id)?.is_none() {
            return Err(Error::not_found(format!("account type {}", id)));
        }
        let account_type = AccountType {
            id,
            ..AccountType::new(input.name, input.description)
        };
        account_type.validate().map_err(Error::validation)?;

        self.repository.update_account_type(&account_type)?;
        self.audit(AuditAction::Update, EntityKind::AccountType, id, actor);
        Ok(account_type)
    }

    // === Service types ===

    pub fn list_service_types(&self) -> Result<Vec<ServiceType>> {
        self.repository.list_service_types()
    }

    pub fn create_service_type(&self, input: CatalogInput, actor: &Actor) -> Result<ServiceType> {
        let service_type = ServiceType::new(input.name, input.description);
        service_type.validate().map_err(Error::validation)?;

        self.repository.insert_service_type(&service_type)?;
        self.audit(AuditAction::Create, EntityKind::ServiceType, service_type.id, actor);
        Ok(service_type)
    }

    pub fn update_service_type(
        &self,
        id: Uuid,
        input: CatalogInput,
        actor: &Actor,
    ) -> Result<ServiceType> {
        if self.repository.get_service_type(id)?.is_none() {
            return Err(Error::not_found(format!("service type {}", id)));
        }
        let service_type = ServiceType {
            id,
            ..ServiceType::new(input.name, input.description)
        };
        service_type.validate().map_err(Error::validation)?;

        self.repository.update_service_type(&service_type)?;
        self.audit(AuditAction::Update, EntityKind::ServiceType, id, actor);
        Ok(service_type)
    }

    fn audit(&self, action: AuditAction, entity: EntityKind, id: Uuid, actor: &Actor) {
        record_best_effort(self.repository.as_ref(), action, entity, id, actor);
    }
}
