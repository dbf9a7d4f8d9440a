//! Ledger port - account lookup and atomic balance movements

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{Account, AuditEntry, RfidCard, ServicePayment, ServiceType, Transfer};

/// Operations available inside one atomic unit of work
///
/// Everything done through a `LedgerUnit` becomes visible together when the
/// unit commits, or not at all. Reads inside a unit see the unit's own
/// writes and are never interleaved with another unit's writes.
pub trait LedgerUnit {
    /// Read an account as of this unit
    fn find_account(&mut self, id: Uuid) -> Result<Option<Account>>;

    /// Read a service type as of this unit
    fn find_service_type(&mut self, id: Uuid) -> Result<Option<ServiceType>>;

    /// Read a card by its normalized number as of this unit
    fn find_card_by_number(&mut self, card_number: &str) -> Result<Option<RfidCard>>;

    /// Add `delta` (negative for a debit) to an account balance
    fn apply_delta(&mut self, account_id: Uuid, delta: Decimal) -> Result<()>;

    /// Persist a new transfer record
    fn insert_transfer(&mut self, transfer: &Transfer) -> Result<()>;

    /// Persist a new service payment record
    fn insert_payment(&mut self, payment: &ServicePayment) -> Result<()>;

    /// Append an audit entry that commits or rolls back with the unit
    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()>;
}

/// Account store abstraction
///
/// Implementations (adapters) guarantee that a unit started with
/// [`LedgerStore::atomically`] is isolated from every other unit touching
/// the same accounts.
pub trait LedgerStore: Send + Sync {
    /// Look up an account outside of any unit
    fn find_account(&self, id: Uuid) -> Result<Option<Account>>;

    /// Run `work` as one atomic unit
    ///
    /// Commits when `work` returns `Ok`; rolls back every change when it
    /// returns `Err` or when the commit itself fails.
    fn atomically<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerUnit) -> std::result::Result<T, E>,
        E: From<Error>;
}
