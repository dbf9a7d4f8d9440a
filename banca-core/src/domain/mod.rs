//! Core domain entities
//!
//! All business entities are defined here. These are pure data structures
//! with validation logic - no I/O or external dependencies.

mod account;
mod audit;
mod card;
mod catalog;
mod client;
pub mod money;
mod payment;
pub mod result;
mod transfer;
mod user;

pub use account::{Account, AccountView};
pub use audit::{AuditAction, AuditEntry, EntityKind};
pub use card::RfidCard;
pub use catalog::{AccountType, ServiceType};
pub use client::Client;
pub use payment::{CardPaymentRequest, PaymentError, PaymentOrder, PaymentRequest, ServicePayment};
pub use transfer::{Transfer, TransferError, TransferOrder, TransferRequest, TransferView};
pub use user::{Actor, Role, User};
