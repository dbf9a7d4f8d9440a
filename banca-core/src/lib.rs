//! Banca Core - Business logic for bank administration
//!
//! This crate implements the core domain logic following hexagonal architecture:
//!
//! - **domain**: Core business entities (Account, Transfer, Client, etc.)
//! - **ports**: Trait definitions for external dependencies (LedgerStore, AuditRecorder)
//! - **services**: Business logic orchestration
//! - **adapters**: Concrete implementations (DuckDB)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use services::*;

// Re-export commonly used types at crate root
pub use config::TransferAuditPolicy;
pub use domain::result::{Error, ErrorDetail, OperationResult, Result};
pub use domain::{
    Account, AccountType, AccountView, Actor, AuditAction, AuditEntry, CardPaymentRequest,
    Client, EntityKind, PaymentError, PaymentRequest, RfidCard, Role, ServicePayment,
    ServiceType, Transfer, TransferError, TransferRequest, TransferView, User,
};

/// Main context for Banca operations
///
/// This is the primary entry point for all business logic. It holds
/// the database connection, configuration, and all services.
pub struct BancaContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub status_service: StatusService,
    pub transfer_service: TransferService,
    pub payment_service: PaymentService,
    pub client_service: ClientService,
    pub account_service: AccountService,
    pub catalog_service: CatalogService,
    pub card_service: CardService,
    pub user_service: UserService,
    pub audit_service: AuditService,
}

impl BancaContext {
    /// Open the data directory, loading settings.json from it
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::with_config(data_dir, config)
    }

    /// Open the data directory with an already resolved configuration
    pub fn with_config(data_dir: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;

        let db_path = data_dir.join(&config.database_file);
        let repository = Arc::new(DuckDbRepository::new(&db_path)?);

        // Initialize schema
        repository.ensure_schema()?;

        Ok(Self {
            status_service: StatusService::new(Arc::clone(&repository)),
            transfer_service: TransferService::new(Arc::clone(&repository), config.transfer_audit),
            payment_service: PaymentService::new(Arc::clone(&repository)),
            client_service: ClientService::new(Arc::clone(&repository)),
            account_service: AccountService::new(Arc::clone(&repository)),
            catalog_service: CatalogService::new(Arc::clone(&repository)),
            card_service: CardService::new(Arc::clone(&repository)),
            user_service: UserService::new(Arc::clone(&repository)),
            audit_service: AuditService::new(Arc::clone(&repository)),
            repository,
            config,
            data_dir: data_dir.to_path_buf(),
        })
    }
}
