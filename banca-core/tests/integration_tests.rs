//! Integration tests for banca-core services
//!
//! These tests verify the money-movement guarantees using real DuckDB.
//! Storage faults are injected at the port level, but all database
//! operations are real.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use banca_core::adapters::duckdb::DuckDbRepository;
use banca_core::config::Config;
use banca_core::domain::money::MAX_MONEY;
use banca_core::domain::result::{Error, Result};
use banca_core::domain::{
    Account, AccountType, Actor, AuditAction, AuditEntry, Client, EntityKind, PaymentError,
    PaymentRequest, RfidCard, ServicePayment, ServiceType, Transfer, TransferError,
    TransferRequest,
};
use banca_core::ports::{AuditRecorder, LedgerStore, LedgerUnit};
use banca_core::services::{
    CatalogInput, ClientInput, OpenAccount, PaymentService, TransferService,
};
use banca_core::{BancaContext, TransferAuditPolicy};

// ============================================================================
// Test Helpers
// ============================================================================

/// Create a test repository with schema initialized
fn create_test_repo(temp_dir: &TempDir) -> Arc<DuckDbRepository> {
    let db_path = temp_dir.path().join("test.duckdb");
    let repo = DuckDbRepository::new(&db_path).expect("Failed to create repository");
    repo.ensure_schema().expect("Failed to initialize schema");
    Arc::new(repo)
}

/// Two accounts owned by one client, with the given opening balances
fn create_accounts(repo: &DuckDbRepository, source: Decimal, destination: Decimal) -> (Account, Account) {
    let client = Client::new("Test", "Client");
    repo.insert_client(&client).unwrap();
    let account_type = AccountType::new("Checking", None);
    repo.insert_account_type(&account_type).unwrap();

    let src = Account::new("SRC-001", client.id, account_type.id, source);
    let dst = Account::new("DST-001", client.id, account_type.id, destination);
    repo.insert_account(&src).unwrap();
    repo.insert_account(&dst).unwrap();
    (src, dst)
}

fn transfer_request(source: Uuid, destination: Uuid, amount: Decimal, user: Uuid) -> TransferRequest {
    TransferRequest {
        timestamp: Some(Utc::now()),
        amount: Some(amount),
        source_account_id: Some(source),
        destination_account_id: Some(destination),
        authorizing_user_id: Some(user),
    }
}

fn balance_of(repo: &DuckDbRepository, id: Uuid) -> Decimal {
    repo.get_account(id).unwrap().expect("account exists").balance
}

/// Assert that nothing was recorded by a rejected or failed transfer
fn assert_untouched(repo: &DuckDbRepository, src: &Account, dst: &Account) {
    assert_eq!(balance_of(repo, src.id), src.balance);
    assert_eq!(balance_of(repo, dst.id), dst.balance);
    assert!(repo.list_transfers().unwrap().is_empty());
    assert!(repo.list_audits(None, None).unwrap().is_empty());
}

// ============================================================================
// Fault injection
// ============================================================================

/// Step of a unit of work at which the faulty store fails
#[derive(Debug, Clone, Copy, PartialEq)]
enum FaultPoint {
    /// First balance update (the debit)
    Debit,
    /// Second balance update (the credit of a transfer)
    Credit,
    InsertTransfer,
    InsertPayment,
    AppendAudit,
    /// After every step succeeded, just before the commit
    Commit,
    /// Standalone audit appends outside any unit
    Recorder,
}

/// Ledger store that delegates to DuckDB but fails at one chosen step
struct FaultyStore {
    inner: Arc<DuckDbRepository>,
    fail_at: FaultPoint,
}

struct FaultyUnit<'a> {
    inner: &'a mut dyn LedgerUnit,
    fail_at: FaultPoint,
    deltas: usize,
}

fn injected() -> Error {
    Error::database("injected storage fault")
}

impl LedgerUnit for FaultyUnit<'_> {
    fn find_account(&mut self, id: Uuid) -> Result<Option<Account>> {
        self.inner.find_account(id)
    }

    fn find_service_type(&mut self, id: Uuid) -> Result<Option<ServiceType>> {
        self.inner.find_service_type(id)
    }

    fn find_card_by_number(&mut self, card_number: &str) -> Result<Option<RfidCard>> {
        self.inner.find_card_by_number(card_number)
    }

    fn apply_delta(&mut self, account_id: Uuid, delta: Decimal) -> Result<()> {
        self.deltas += 1;
        match (self.fail_at, self.deltas) {
            (FaultPoint::Debit, 1) | (FaultPoint::Credit, 2) => return Err(injected()),
            _ => {}
        }
        self.inner.apply_delta(account_id, delta)
    }

    fn insert_transfer(&mut self, transfer: &Transfer) -> Result<()> {
        if self.fail_at == FaultPoint::InsertTransfer {
            return Err(injected());
        }
        self.inner.insert_transfer(transfer)
    }

    fn insert_payment(&mut self, payment: &ServicePayment) -> Result<()> {
        if self.fail_at == FaultPoint::InsertPayment {
            return Err(injected());
        }
        self.inner.insert_payment(payment)
    }

    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        if self.fail_at == FaultPoint::AppendAudit {
            return Err(injected());
        }
        self.inner.append_audit(entry)
    }
}

impl LedgerStore for FaultyStore {
    fn find_account(&self, id: Uuid) -> Result<Option<Account>> {
        self.inner.find_account(id)
    }

    fn atomically<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerUnit) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let fail_at = self.fail_at;
        self.inner.atomically(|unit| {
            let mut faulty = FaultyUnit {
                inner: unit,
                fail_at,
                deltas: 0,
            };
            let value = work(&mut faulty)?;
            if fail_at == FaultPoint::Commit {
                return Err(injected().into());
            }
            Ok(value)
        })
    }
}

impl AuditRecorder for FaultyStore {
    fn append(
        &self,
        action: AuditAction,
        entity: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
    ) -> Result<AuditEntry> {
        if self.fail_at == FaultPoint::Recorder {
            return Err(injected());
        }
        self.inner.append(action, entity, entity_id, user_id)
    }
}

// ============================================================================
// Transfer scenarios
// ============================================================================

#[test]
fn test_transfer_scenario_moves_exact_amount() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100050, 2), Decimal::new(20000, 2));
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);
    let user = Uuid::new_v4();

    let transfer = service
        .create(transfer_request(src.id, dst.id, Decimal::new(30000, 2), user))
        .unwrap();

    assert_eq!(balance_of(&repo, src.id), Decimal::new(70050, 2));
    assert_eq!(balance_of(&repo, dst.id), Decimal::new(50000, 2));

    let transfers = repo.list_transfers().unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].id, transfer.id);
    assert_eq!(transfers[0].amount, Decimal::new(30000, 2));

    let audits = repo.list_audits(None, None).unwrap();
    assert_eq!(audits.len(), 1);
    assert_eq!(audits[0].action, AuditAction::Create);
    assert_eq!(audits[0].entity, "Transfer");
    assert_eq!(audits[0].entity_id, transfer.id);
    assert_eq!(audits[0].user_id, user);
}

#[test]
fn test_transfer_scenario_insufficient_funds() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(5000, 2), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    let err = service
        .create(transfer_request(src.id, dst.id, Decimal::new(10000, 2), Uuid::new_v4()))
        .unwrap_err();

    assert_eq!(err.code(), "INSUFFICIENT_FUNDS");
    assert_untouched(&repo, &src, &dst);
}

#[test]
fn test_exact_balance_can_be_transferred() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(5000, 2), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    service
        .create(transfer_request(src.id, dst.id, Decimal::new(5000, 2), Uuid::new_v4()))
        .unwrap();

    assert_eq!(balance_of(&repo, src.id), Decimal::ZERO);
    assert_eq!(balance_of(&repo, dst.id), Decimal::new(5000, 2));
}

// ============================================================================
// Rejections
// ============================================================================

#[test]
fn test_missing_fields_are_all_listed() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    let request = TransferRequest {
        source_account_id: Some(src.id),
        ..Default::default()
    };
    match service.create(request).unwrap_err() {
        TransferError::MissingFields(fields) => {
            assert!(fields.contains(&"amount"));
            assert!(fields.contains(&"destination_account_id"));
            assert!(fields.contains(&"authorizing_user_id"));
            assert!(!fields.contains(&"source_account_id"));
        }
        other => panic!("expected MissingFields, got {:?}", other),
    }
    assert_untouched(&repo, &src, &dst);
}

#[test]
fn test_same_account_rejected_regardless_of_balance() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(1_000_000, 0), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    for amount in [Decimal::ONE, Decimal::ZERO, Decimal::new(2_000_000, 0)] {
        let err = service
            .create(transfer_request(src.id, src.id, amount, Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(err, TransferError::SameAccount);
    }
    assert_untouched(&repo, &src, &dst);
}

#[test]
fn test_non_positive_and_fractional_cent_amounts_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    for amount in [Decimal::ZERO, Decimal::new(-1000, 2), Decimal::new(1005, 3)] {
        let err = service
            .create(transfer_request(src.id, dst.id, amount, Uuid::new_v4()))
            .unwrap_err();
        assert_eq!(err, TransferError::InvalidAmount, "amount {}", amount);
    }
    assert_untouched(&repo, &src, &dst);
}

#[test]
fn test_unknown_accounts_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);
    let ghost = Uuid::new_v4();

    assert_eq!(
        service
            .create(transfer_request(ghost, dst.id, Decimal::ONE, Uuid::new_v4()))
            .unwrap_err(),
        TransferError::AccountNotFound(ghost)
    );
    assert_eq!(
        service
            .create(transfer_request(src.id, ghost, Decimal::ONE, Uuid::new_v4()))
            .unwrap_err(),
        TransferError::AccountNotFound(ghost)
    );
    assert_untouched(&repo, &src, &dst);
}

#[test]
fn test_credit_past_balance_limit_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let near_limit = Decimal::new(999_999_999_999_999_900, 2);
    let (src, dst) = create_accounts(&repo, near_limit, near_limit);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    let err = service
        .create(transfer_request(src.id, dst.id, Decimal::new(5, 0), Uuid::new_v4()))
        .unwrap_err();

    assert_eq!(err, TransferError::BalanceLimitExceeded(dst.id));
    assert!(err.is_validation());
    assert_untouched(&repo, &src, &dst);

    // Filling the destination exactly to the limit is allowed
    service
        .create(transfer_request(src.id, dst.id, Decimal::new(99, 2), Uuid::new_v4()))
        .unwrap();
    assert_eq!(balance_of(&repo, dst.id), MAX_MONEY);
}

#[test]
fn test_inactive_accounts_rejected_even_with_funds() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let service = TransferService::new(Arc::clone(&repo), TransferAuditPolicy::Durable);

    repo.set_account_active(dst.id, false).unwrap();
    assert_eq!(
        service
            .create(transfer_request(src.id, dst.id, Decimal::ONE, Uuid::new_v4()))
            .unwrap_err(),
        TransferError::InactiveAccount(dst.id)
    );

    // Source is reported first when both are inactive
    repo.set_account_active(src.id, false).unwrap();
    assert_eq!(
        service
            .create(transfer_request(src.id, dst.id, Decimal::ONE, Uuid::new_v4()))
            .unwrap_err(),
        TransferError::InactiveAccount(src.id)
    );
    assert_untouched(&repo, &src, &dst);
}

// ============================================================================
// Atomicity
// ============================================================================

#[test]
fn test_fault_at_any_step_rolls_back_everything() {
    for fail_at in [
        FaultPoint::Debit,
        FaultPoint::Credit,
        FaultPoint::InsertTransfer,
        FaultPoint::AppendAudit,
        FaultPoint::Commit,
    ] {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_test_repo(&temp_dir);
        let (src, dst) = create_accounts(&repo, Decimal::new(100050, 2), Decimal::new(20000, 2));
        let store = Arc::new(FaultyStore {
            inner: Arc::clone(&repo),
            fail_at,
        });
        let service = TransferService::new(store, TransferAuditPolicy::Durable);

        let err = service
            .create(transfer_request(src.id, dst.id, Decimal::new(30000, 2), Uuid::new_v4()))
            .unwrap_err();

        assert!(matches!(err, TransferError::Persistence(_)), "{:?}: {:?}", fail_at, err);
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
        assert_untouched(&repo, &src, &dst);
    }
}

#[test]
fn test_payment_fault_rolls_back_everything() {
    for fail_at in [
        FaultPoint::Debit,
        FaultPoint::InsertPayment,
        FaultPoint::AppendAudit,
        FaultPoint::Commit,
    ] {
        let temp_dir = TempDir::new().unwrap();
        let repo = create_test_repo(&temp_dir);
        let (account, _) = create_accounts(&repo, Decimal::new(10000, 2), Decimal::ZERO);
        let service_type = ServiceType::new("Water", None);
        repo.insert_service_type(&service_type).unwrap();
        let store = Arc::new(FaultyStore {
            inner: Arc::clone(&repo),
            fail_at,
        });
        let service = PaymentService::new(store);

        let err = service
            .pay(PaymentRequest {
                paid_at: Some(Utc::now()),
                amount: Some(Decimal::new(2550, 2)),
                account_id: Some(account.id),
                service_type_id: Some(service_type.id),
                authorizing_user_id: Some(Uuid::new_v4()),
            })
            .unwrap_err();

        assert!(matches!(err, PaymentError::Persistence(_)), "{:?}: {:?}", fail_at, err);
        assert_eq!(balance_of(&repo, account.id), account.balance);
        assert!(repo.list_payments().unwrap().is_empty());
        assert!(repo.list_audits(None, None).unwrap().is_empty());
    }
}

#[test]
fn test_best_effort_audit_failure_keeps_transfer() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let store = Arc::new(FaultyStore {
        inner: Arc::clone(&repo),
        fail_at: FaultPoint::Recorder,
    });
    let service = TransferService::new(store, TransferAuditPolicy::BestEffort);

    service
        .create(transfer_request(src.id, dst.id, Decimal::new(40, 0), Uuid::new_v4()))
        .unwrap();

    assert_eq!(balance_of(&repo, src.id), Decimal::new(60, 0));
    assert_eq!(repo.list_transfers().unwrap().len(), 1);
    assert!(repo.list_audits(None, None).unwrap().is_empty());
}

#[test]
fn test_durable_audit_failure_fails_transfer() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let store = Arc::new(FaultyStore {
        inner: Arc::clone(&repo),
        fail_at: FaultPoint::AppendAudit,
    });
    let service = TransferService::new(store, TransferAuditPolicy::Durable);

    assert!(service
        .create(transfer_request(src.id, dst.id, Decimal::new(40, 0), Uuid::new_v4()))
        .is_err());
    assert_untouched(&repo, &src, &dst);
}

/// A store whose units never run: the work closure must not be reached
/// when request-level validation fails
struct CountingStore {
    inner: Arc<DuckDbRepository>,
    units: AtomicUsize,
}

impl LedgerStore for CountingStore {
    fn find_account(&self, id: Uuid) -> Result<Option<Account>> {
        self.inner.find_account(id)
    }

    fn atomically<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerUnit) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        self.units.fetch_add(1, Ordering::SeqCst);
        self.inner.atomically(work)
    }
}

impl AuditRecorder for CountingStore {
    fn append(
        &self,
        action: AuditAction,
        entity: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
    ) -> Result<AuditEntry> {
        self.inner.append(action, entity, entity_id, user_id)
    }
}

#[test]
fn test_request_validation_happens_before_any_unit() {
    let temp_dir = TempDir::new().unwrap();
    let repo = create_test_repo(&temp_dir);
    let (src, _dst) = create_accounts(&repo, Decimal::new(100, 0), Decimal::ZERO);
    let store = Arc::new(CountingStore {
        inner: Arc::clone(&repo),
        units: AtomicUsize::new(0),
    });
    let service = TransferService::new(Arc::clone(&store), TransferAuditPolicy::Durable);

    service.create(TransferRequest::default()).unwrap_err();
    service
        .create(transfer_request(src.id, src.id, Decimal::ONE, Uuid::new_v4()))
        .unwrap_err();

    assert_eq!(store.units.load(Ordering::SeqCst), 0);
}

// ============================================================================
// Context wiring
// ============================================================================

#[test]
fn test_context_end_to_end() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = BancaContext::with_config(temp_dir.path(), Config::default()).unwrap();
    let actor = Actor::new(Uuid::new_v4());

    let client = ctx
        .client_service
        .create(
            ClientInput {
                first_name: "Carmen".to_string(),
                last_name: "Vega".to_string(),
                ..Default::default()
            },
            &actor,
        )
        .unwrap();
    let account_type = ctx
        .catalog_service
        .create_account_type(
            CatalogInput {
                name: "Savings".to_string(),
                description: None,
            },
            &actor,
        )
        .unwrap();

    let open = |number: &str, balance: Decimal| {
        ctx.account_service
            .open(
                OpenAccount {
                    number: number.to_string(),
                    client_id: client.id,
                    account_type_id: account_type.id,
                    balance: Some(balance),
                },
                &actor,
            )
            .unwrap()
    };
    let a = open("A-1", Decimal::new(100050, 2));
    let b = open("B-1", Decimal::new(20000, 2));

    ctx.transfer_service
        .create(transfer_request(a.id, b.id, Decimal::new(30000, 2), actor.user_id))
        .unwrap();

    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_clients, 1);
    assert_eq!(status.total_accounts, 2);
    assert_eq!(status.total_transfers, 1);
    assert_eq!(status.total_balance, Decimal::new(120050, 2));
    // client + account type + two accounts + transfer
    assert_eq!(status.total_audit_entries, 5);

    assert_eq!(ctx.transfer_service.list_for_account(a.id).unwrap().len(), 1);
    assert!(ctx.data_dir.join("banca.duckdb").exists());
}

#[test]
fn test_context_reopens_existing_database() {
    let temp_dir = TempDir::new().unwrap();
    let actor = Actor::new(Uuid::new_v4());
    {
        let ctx = BancaContext::with_config(temp_dir.path(), Config::default()).unwrap();
        ctx.catalog_service
            .create_service_type(
                CatalogInput {
                    name: "Internet".to_string(),
                    description: None,
                },
                &actor,
            )
            .unwrap();
    }

    let ctx = BancaContext::with_config(temp_dir.path(), Config::default()).unwrap();
    assert_eq!(ctx.catalog_service.list_service_types().unwrap().len(), 1);
}
