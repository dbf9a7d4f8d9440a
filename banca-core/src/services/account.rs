//! Account service - opening and maintaining accounts
//!
//! Balances are never edited here: they only move through transfers and
//! payments. Opening an account is the one place a balance is set.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Account, AccountView, Actor, AuditAction, EntityKind};
use crate::services::audit::record_best_effort;

/// Fields accepted when opening an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAccount {
    pub number: String,
    pub client_id: Uuid,
    pub account_type_id: Uuid,
    /// Opening balance; zero when omitted
    #[serde(default)]
    pub balance: Option<Decimal>,
}

/// Fields accepted when updating an account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub number: String,
    pub client_id: Uuid,
    pub account_type_id: Uuid,
}

pub struct AccountService {
    repository: Arc<DuckDbRepository>,
}

impl AccountService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// All accounts with their client and type names
    pub fn list(&self) -> Result<Vec<AccountView>> {
        self.repository.list_account_views(false)
    }

    /// Accounts that can currently send or receive funds
    pub fn list_active(&self) -> Result<Vec<AccountView>> {
        self.repository.list_account_views(true)
    }

    pub fn get(&self, id: Uuid) -> Result<Account> {
        self.repository
            .get_account(id)?
            .ok_or_else(|| Error::not_found(format!("account {}", id)))
    }

    pub fn open(&self, input: OpenAccount, actor: &Actor) -> Result<Account> {
        self.check_owner_and_type(input.client_id, input.account_type_id)?;

        let account = Account::new(
            input.number,
            input.client_id,
            input.account_type_id,
            input.balance.unwrap_or(Decimal::ZERO),
        );
        account.validate().map_err(Error::validation)?;

        self.repository.insert_account(&account)?;
        tracing::info!(account_id = %account.id, "account opened");
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Create,
            EntityKind::Account,
            account.id,
            actor,
        );
        Ok(account)
    }

    pub fn update(&self, id: Uuid, input: AccountUpdate, actor: &Actor) -> Result<Account> {
        let mut account = self.get(id)?;
        if input.client_id != account.client_id || input.account_type_id != account.account_type_id {
            self.check_owner_and_type(input.client_id, input.account_type_id)?;
        }

        account.number = Account::normalize_number(&input.number);
        account.client_id = input.client_id;
        account.account_type_id = input.account_type_id;
        account.validate().map_err(Error::validation)?;
        account.updated_at = Utc::now();

        self.repository.update_account(&account)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Update,
            EntityKind::Account,
            account.id,
            actor,
        );
        Ok(account)
    }

    pub fn deactivate(&self, id: Uuid, actor: &Actor) -> Result<Account> {
        self.set_active(id, false, actor)
    }

    pub fn activate(&self, id: Uuid, actor: &Actor) -> Result<Account> {
        self.set_active(id, true, actor)
    }

    fn set_active(&self, id: Uuid, active: bool, actor: &Actor) -> Result<Account> {
        self.repository.set_account_active(id, active)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Update,
            EntityKind::Account,
            id,
            actor,
        );
        self.get(id)
    }

    /// The client must exist and be active; the account type must exist
    fn check_owner_and_type(&self, client_id: Uuid, account_type_id: Uuid) -> Result<()> {
        let client = self
            .repository
            .get_client(client_id)?
            .ok_or_else(|| Error::validation(format!("client {} does not exist", client_id)))?;
        if !client.active {
            return Err(Error::validation(format!("client {} is inactive", client_id)));
        }
        if self.repository.get_account_type(account_type_id)?.is_none() {
            return Err(Error::validation(format!(
                "account type {} does not exist",
                account_type_id
            )));
        }
        Ok(())
    }
}
