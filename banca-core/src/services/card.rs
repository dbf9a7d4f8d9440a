//! Card service - RFID cards linked to accounts

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::{Error, Result};
use crate::domain::{Actor, AuditAction, EntityKind, RfidCard};
use crate::services::audit::record_best_effort;

/// Fields accepted when assigning or updating a card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardInput {
    pub card_number: String,
    pub account_id: Uuid,
    /// Defaults to today on assignment
    #[serde(default)]
    pub assigned_on: Option<NaiveDate>,
    #[serde(default)]
    pub active: Option<bool>,
}

pub struct CardService {
    repository: Arc<DuckDbRepository>,
}

impl CardService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    pub fn list(&self) -> Result<Vec<RfidCard>> {
        self.repository.list_cards()
    }

    pub fn get(&self, id: Uuid) -> Result<RfidCard> {
        self.repository
            .get_card(id)?
            .ok_or_else(|| Error::not_found(format!("card {}", id)))
    }

    pub fn assign(&self, input: CardInput, actor: &Actor) -> Result<RfidCard> {
        self.check_account(input.account_id)?;

        let mut card = RfidCard::new(
            &input.card_number,
            input.account_id,
            input.assigned_on.unwrap_or_else(|| Utc::now().date_naive()),
        );
        if let Some(active) = input.active {
            card.active = active;
        }
        card.validate().map_err(Error::validation)?;

        self.repository.insert_card(&card)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Create,
            EntityKind::RfidCard,
            card.id,
            actor,
        );
        Ok(card)
    }

    pub fn update(&self, id: Uuid, input: CardInput, actor: &Actor) -> Result<RfidCard> {
        let mut card = self.get(id)?;
        if input.account_id != card.account_id {
            self.check_account(input.account_id)?;
        }

        card.card_number = RfidCard::normalize_number(&input.card_number);
        card.account_id = input.account_id;
        if let Some(assigned_on) = input.assigned_on {
            card.assigned_on = assigned_on;
        }
        if let Some(active) = input.active {
            card.active = active;
        }
        card.validate().map_err(Error::validation)?;

        self.repository.update_card(&card)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Update,
            EntityKind::RfidCard,
            card.id,
            actor,
        );
        Ok(card)
    }

    /// Unlink and delete a card
    pub fn remove(&self, id: Uuid, actor: &Actor) -> Result<()> {
        self.repository.delete_card(id)?;
        record_best_effort(
            self.repository.as_ref(),
            AuditAction::Delete,
            EntityKind::RfidCard,
            id,
            actor,
        );
        Ok(())
    }

    fn check_account(&self, account_id: Uuid) -> Result<()> {
        match self.repository.get_account(account_id)? {
            Some(_) => Ok(()),
            None => Err(Error::validation(format!("account {} does not exist", account_id))),
        }
    }
}
