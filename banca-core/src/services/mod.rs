//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod account;
pub mod audit;
mod card;
mod catalog;
mod client;
pub mod logging;
pub mod migration;
pub mod password;
mod payment;
mod status;
mod transfer;
mod user;

pub use account::{AccountService, AccountUpdate, OpenAccount};
pub use audit::{record_best_effort, AuditService};
pub use card::{CardInput, CardService};
pub use catalog::{CatalogInput, CatalogService};
pub use client::{ClientInput, ClientService};
pub use logging::{EntryPoint, LogEntry, LogEvent, LogStats, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use payment::PaymentService;
pub use status::{StatusService, StatusSummary};
pub use transfer::TransferService;
pub use user::{NewUser, RoleInput, UserService, UserUpdate};
