//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The transfer and
//! payment processors depend only on these traits, not on DuckDB.

mod audit;
mod ledger;

pub use audit::AuditRecorder;
pub use ledger::{LedgerStore, LedgerUnit};
