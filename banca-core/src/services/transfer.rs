//! Transfer service - moves funds between two accounts
//!
//! A transfer is accepted only when every rule holds, checked in this order:
//! all fields present, distinct accounts, both accounts exist, positive
//! amount, both accounts active, enough funds in the source, room in the
//! destination for the credit. The account checks run inside the same
//! atomic unit as the balance movement, so no other transfer can slip in
//! between the check and the debit.

use std::sync::Arc;

use uuid::Uuid;

use crate::adapters::duckdb::DuckDbRepository;
use crate::config::TransferAuditPolicy;
use crate::domain::money::credited_balance;
use crate::domain::result::{Error, Result};
use crate::domain::{
    Actor, AuditAction, AuditEntry, EntityKind, Transfer, TransferError, TransferRequest,
    TransferView,
};
use crate::ports::{AuditRecorder, LedgerStore};
use crate::services::audit::record_best_effort;

/// Transfer processor
pub struct TransferService<S = DuckDbRepository> {
    store: Arc<S>,
    audit_policy: TransferAuditPolicy,
}

impl<S> TransferService<S>
where
    S: LedgerStore + AuditRecorder,
{
    pub fn new(store: Arc<S>, audit_policy: TransferAuditPolicy) -> Self {
        Self {
            store,
            audit_policy,
        }
    }

    pub fn audit_policy(&self) -> TransferAuditPolicy {
        self.audit_policy
    }

    /// Validate and execute a transfer
    ///
    /// On success both balances, the transfer record and (with the durable
    /// policy) its audit entry are committed together. On any error nothing
    /// is changed.
    pub fn create(&self, request: TransferRequest) -> std::result::Result<Transfer, TransferError> {
        let order = request.into_order().inspect_err(log_rejection)?;
        let durable_audit = self.audit_policy == TransferAuditPolicy::Durable;

        let outcome = self
            .store
            .atomically(|unit| -> std::result::Result<Transfer, TransferError> {
                let source = unit
                    .find_account(order.source_account_id)?
                    .ok_or(TransferError::AccountNotFound(order.source_account_id))?;
                let destination = unit
                    .find_account(order.destination_account_id)?
                    .ok_or(TransferError::AccountNotFound(order.destination_account_id))?;

                if !order.amount_is_valid() {
                    return Err(TransferError::InvalidAmount);
                }
                if !source.active {
                    return Err(TransferError::InactiveAccount(source.id));
                }
                if !destination.active {
                    return Err(TransferError::InactiveAccount(destination.id));
                }
                if !source.can_cover(order.amount) {
                    return Err(TransferError::InsufficientFunds {
                        account_id: source.id,
                        available: source.balance,
                        requested: order.amount,
                    });
                }
                if credited_balance(destination.balance, order.amount).is_none() {
                    return Err(TransferError::BalanceLimitExceeded(destination.id));
                }

                let transfer = order.into_transfer();
                unit.apply_delta(source.id, -transfer.amount)?;
                unit.apply_delta(destination.id, transfer.amount)?;
                unit.insert_transfer(&transfer)?;
                if durable_audit {
                    unit.append_audit(&AuditEntry::new(
                        AuditAction::Create,
                        EntityKind::Transfer,
                        transfer.id,
                        transfer.authorizing_user_id,
                    ))?;
                }
                Ok(transfer)
            });

        let transfer = outcome.inspect_err(log_rejection)?;

        tracing::info!(
            transfer_id = %transfer.id,
            source = %transfer.source_account_id,
            destination = %transfer.destination_account_id,
            "transfer committed"
        );

        if !durable_audit {
            record_best_effort(
                self.store.as_ref(),
                AuditAction::Create,
                EntityKind::Transfer,
                transfer.id,
                &Actor::new(transfer.authorizing_user_id),
            );
        }

        Ok(transfer)
    }
}

impl TransferService<DuckDbRepository> {
    /// All transfers, newest first
    pub fn list(&self) -> Result<Vec<Transfer>> {
        self.store.list_transfers()
    }

    pub fn get(&self, id: Uuid) -> Result<Transfer> {
        self.store
            .get_transfer(id)?
            .ok_or_else(|| Error::not_found(format!("transfer {}", id)))
    }

    /// Transfers where the account is source or destination, newest first
    pub fn list_for_account(&self, account_id: Uuid) -> Result<Vec<Transfer>> {
        self.require_account(account_id)?;
        self.store.list_transfers_for_account(account_id)
    }

    /// Transfer history with account numbers and client names
    pub fn list_views(&self) -> Result<Vec<TransferView>> {
        self.store.list_transfer_views(None)
    }

    pub fn list_views_for_account(&self, account_id: Uuid) -> Result<Vec<TransferView>> {
        self.require_account(account_id)?;
        self.store.list_transfer_views(Some(account_id))
    }

    fn require_account(&self, account_id: Uuid) -> Result<()> {
        if self.store.get_account(account_id)?.is_none() {
            return Err(Error::not_found(format!("account {}", account_id)));
        }
        Ok(())
    }
}

fn log_rejection(err: &TransferError) {
    if err.is_validation() {
        tracing::warn!(code = err.code(), "transfer rejected: {}", err);
    } else {
        tracing::error!(code = err.code(), "transfer failed: {}", err);
    }
}
