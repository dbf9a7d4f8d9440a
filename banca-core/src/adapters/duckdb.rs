//! DuckDB repository implementation

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use duckdb::types::Type;
use duckdb::{params, Connection, Row};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::result::{Error, Result};
use crate::domain::{
    Account, AccountType, AccountView, AuditAction, AuditEntry, Client, EntityKind, RfidCard,
    Role, ServicePayment, ServiceType, Transfer, TransferView, User,
};
use crate::ports::{AuditRecorder, LedgerStore, LedgerUnit};
use crate::services::{MigrationResult, MigrationService};

/// Maximum number of retries when database file is locked
const MAX_RETRIES: u32 = 5;

/// Initial retry delay in milliseconds (doubles each retry: 50, 100, 200, 400, 800ms)
const INITIAL_RETRY_DELAY_MS: u64 = 50;

/// Check if an error message indicates a file locking issue that should be retried
fn is_retryable_error(err_msg: &str) -> bool {
    let lower = err_msg.to_lowercase();
    // Windows error messages
    lower.contains("being used by another process")
        || lower.contains("cannot access the file")
        // Unix/macOS error messages
        || lower.contains("resource temporarily unavailable")
        || lower.contains("database is locked")
        || lower.contains("file is already open")
        || lower.contains("could not set lock on file")
}

const ACCOUNT_COLUMNS: &str = "account_id, number, client_id, account_type_id,
     CAST(balance AS VARCHAR), active, created_at, updated_at";

const CLIENT_COLUMNS: &str = "client_id, first_name, last_name, address, phone, email,
     profile, active, created_at, updated_at";

const CARD_COLUMNS: &str =
    "card_id, card_number, account_id, CAST(assigned_on AS VARCHAR), active";

const PAYMENT_COLUMNS: &str = "payment_id, paid_at, CAST(amount AS VARCHAR), account_id,
     service_type_id, card_id, authorizing_user_id, created_at";

const TRANSFER_COLUMNS: &str = "transfer_id, transferred_at, CAST(amount AS VARCHAR),
     source_account_id, destination_account_id, authorizing_user_id, created_at";

const USER_COLUMNS: &str =
    "user_id, username, password_hash, role_id, active, created_at, updated_at";

const AUDIT_COLUMNS: &str = "audit_id, occurred_at, action, entity, entity_id, user_id";

/// Row counts and totals for the status summary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableCounts {
    pub clients: i64,
    pub accounts: i64,
    pub active_accounts: i64,
    pub total_balance: Decimal,
    pub transfers: i64,
    pub payments: i64,
    pub audit_entries: i64,
}

/// DuckDB repository implementation
///
/// Owns a single connection. Every method (and every unit started through
/// [`LedgerStore::atomically`]) holds the connection lock for its whole
/// duration, so units never interleave.
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the database file
    ///
    /// Includes retry logic with exponential backoff for file locking errors,
    /// which can occur when the CLI and the server start against the same
    /// data directory at the same time.
    pub fn new(db_path: &Path) -> Result<Self> {
        let mut last_error = None;

        for attempt in 0..MAX_RETRIES {
            match Self::try_open_connection(db_path) {
                Ok(conn) => {
                    return Ok(Self {
                        conn: Mutex::new(conn),
                        db_path: db_path.to_path_buf(),
                    });
                }
                Err(e) => {
                    let err_msg = e.to_string();
                    if is_retryable_error(&err_msg) && attempt < MAX_RETRIES - 1 {
                        let delay =
                            Duration::from_millis(INITIAL_RETRY_DELAY_MS * 2u64.pow(attempt));
                        tracing::warn!(
                            delay_ms = delay.as_millis() as u64,
                            attempt = attempt + 1,
                            max = MAX_RETRIES,
                            "database busy, retrying: {}",
                            err_msg
                        );
                        thread::sleep(delay);
                        last_error = Some(e);
                        continue;
                    }
                    return Err(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            Error::database(format!("Failed to open database after {} retries", MAX_RETRIES))
        }))
    }

    fn try_open_connection(db_path: &Path) -> Result<Connection> {
        // Extension autoloading stays off; nothing in the schema needs one
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        Ok(Connection::open_with_flags(db_path, config)?)
    }

    /// Path of the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::database("database connection lock poisoned"))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn)
            .run_pending()
            .map_err(|e| Error::database(format!("migration failed: {:#}", e)))
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::info!(applied = ?result.applied, "applied migrations");
        }
        Ok(())
    }

    // === Client operations ===

    pub fn list_clients(&self) -> Result<Vec<Client>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM clients ORDER BY last_name, first_name",
            CLIENT_COLUMNS
        ))?;
        let clients = stmt
            .query_map([], row_to_client)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(clients)
    }

    pub fn get_client(&self, id: Uuid) -> Result<Option<Client>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM clients WHERE client_id = ?", CLIENT_COLUMNS);
        optional(conn.query_row(&sql, [id.to_string()], row_to_client))
    }

    pub fn insert_client(&self, client: &Client) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO clients (client_id, first_name, last_name, address, phone, email,
                                  profile, active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                client.id.to_string(),
                client.first_name,
                client.last_name,
                client.address,
                client.phone,
                client.email,
                client.profile,
                client.active,
                format_timestamp(&client.created_at),
                format_timestamp(&client.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn update_client(&self, client: &Client) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE clients SET first_name = ?, last_name = ?, address = ?, phone = ?,
                                email = ?, profile = ?, updated_at = ?
             WHERE client_id = ?",
            params![
                client.first_name,
                client.last_name,
                client.address,
                client.phone,
                client.email,
                client.profile,
                format_timestamp(&client.updated_at),
                client.id.to_string(),
            ],
        )?;
        expect_one(changed, "client", client.id)
    }

    pub fn set_client_active(&self, id: Uuid, active: bool) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE clients SET active = ?, updated_at = ? WHERE client_id = ?",
            params![active, format_timestamp(&Utc::now()), id.to_string()],
        )?;
        expect_one(changed, "client", id)
    }

    // === Account operations ===

    /// Accounts joined with their client and account type names
    pub fn list_account_views(&self, active_only: bool) -> Result<Vec<AccountView>> {
        let conn = self.lock()?;
        let filter = if active_only { "WHERE a.active" } else { "" };
        let mut stmt = conn.prepare(&format!(
            "SELECT a.account_id, a.number, a.client_id,
                    COALESCE(c.first_name || ' ' || c.last_name, ''),
                    a.account_type_id, COALESCE(t.name, ''),
                    CAST(a.balance AS VARCHAR), a.active
             FROM accounts a
             LEFT JOIN clients c ON c.client_id = a.client_id
             LEFT JOIN account_types t ON t.account_type_id = a.account_type_id
             {}
             ORDER BY a.number",
            filter
        ))?;
        let views = stmt
            .query_map([], |row| {
                Ok(AccountView {
                    id: get_uuid(row, 0)?,
                    number: row.get(1)?,
                    client_id: get_uuid(row, 2)?,
                    client_name: row.get(3)?,
                    account_type_id: get_uuid(row, 4)?,
                    account_type_name: row.get(5)?,
                    balance: get_decimal(row, 6)?,
                    active: row.get(7)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(views)
    }

    pub fn get_account(&self, id: Uuid) -> Result<Option<Account>> {
        let conn = self.lock()?;
        query_account(&conn, id)
    }

    pub fn insert_account(&self, account: &Account) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO accounts (account_id, number, client_id, account_type_id, balance,
                                   active, created_at, updated_at)
             VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(18,2)), ?, ?, ?)",
            params![
                account.id.to_string(),
                account.number,
                account.client_id.to_string(),
                account.account_type_id.to_string(),
                account.balance.to_string(),
                account.active,
                format_timestamp(&account.created_at),
                format_timestamp(&account.updated_at),
            ],
        )?;
        Ok(())
    }

    /// Update number, owner and type. The balance column is never written here.
    pub fn update_account(&self, account: &Account) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE accounts SET number = ?, client_id = ?, account_type_id = ?, updated_at = ?
             WHERE account_id = ?",
            params![
                account.number,
                account.client_id.to_string(),
                account.account_type_id.to_string(),
                format_timestamp(&account.updated_at),
                account.id.to_string(),
            ],
        )?;
        expect_one(changed, "account", account.id)
    }

    pub fn set_account_active(&self, id: Uuid, active: bool) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE accounts SET active = ?, updated_at = ? WHERE account_id = ?",
            params![active, format_timestamp(&Utc::now()), id.to_string()],
        )?;
        expect_one(changed, "account", id)
    }

    // === Account types and service types ===

    pub fn list_account_types(&self) -> Result<Vec<AccountType>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT account_type_id, name, description FROM account_types ORDER BY name",
        )?;
        let types = stmt
            .query_map([], |row| {
                Ok(AccountType {
                    id: get_uuid(row, 0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            })?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(types)
    }

    pub fn get_account_type(&self, id: Uuid) -> Result<Option<AccountType>> {
        let conn = self.lock()?;
        optional(conn.query_row(
            "SELECT account_type_id, name, description FROM account_types
             WHERE account_type_id = ?",
            [id.to_string()],
            |row| {
                Ok(AccountType {
                    id: get_uuid(row, 0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        ))
    }

    pub fn insert_account_type(&self, account_type: &AccountType) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO account_types (account_type_id, name, description) VALUES (?, ?, ?)",
            params![account_type.id.to_string(), account_type.name, account_type.description],
        )?;
        Ok(())
    }

    pub fn update_account_type(&self, account_type: &AccountType) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE account_types SET name = ?, description = ? WHERE account_type_id = ?",
            params![account_type.name, account_type.description, account_type.id.to_string()],
        )?;
        expect_one(changed, "account type", account_type.id)
    }

    pub fn list_service_types(&self) -> Result<Vec<ServiceType>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT service_type_id, name, description FROM service_types ORDER BY name",
        )?;
        let types = stmt
            .query_map([], row_to_service_type)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(types)
    }

    pub fn get_service_type(&self, id: Uuid) -> Result<Option<ServiceType>> {
        let conn = self.lock()?;
        query_service_type(&conn, id)
    }

    pub fn insert_service_type(&self, service_type: &ServiceType) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO service_types (service_type_id, name, description) VALUES (?, ?, ?)",
            params![service_type.id.to_string(), service_type.name, service_type.description],
        )?;
        Ok(())
    }

    pub fn update_service_type(&self, service_type: &ServiceType) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE service_types SET name = ?, description = ? WHERE service_type_id = ?",
            params![service_type.name, service_type.description, service_type.id.to_string()],
        )?;
        expect_one(changed, "service type", service_type.id)
    }

    // === RFID cards ===

    pub fn list_cards(&self) -> Result<Vec<RfidCard>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM rfid_cards ORDER BY card_number",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map([], row_to_card)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(cards)
    }

    pub fn get_card(&self, id: Uuid) -> Result<Option<RfidCard>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM rfid_cards WHERE card_id = ?", CARD_COLUMNS);
        optional(conn.query_row(&sql, [id.to_string()], row_to_card))
    }

    pub fn insert_card(&self, card: &RfidCard) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO rfid_cards (card_id, card_number, account_id, assigned_on, active)
             VALUES (?, ?, ?, CAST(? AS DATE), ?)",
            params![
                card.id.to_string(),
                card.card_number,
                card.account_id.to_string(),
                format_date(&card.assigned_on),
                card.active,
            ],
        )?;
        Ok(())
    }

    pub fn update_card(&self, card: &RfidCard) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE rfid_cards SET card_number = ?, account_id = ?,
                                   assigned_on = CAST(? AS DATE), active = ?
             WHERE card_id = ?",
            params![
                card.card_number,
                card.account_id.to_string(),
                format_date(&card.assigned_on),
                card.active,
                card.id.to_string(),
            ],
        )?;
        expect_one(changed, "card", card.id)
    }

    pub fn delete_card(&self, id: Uuid) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute("DELETE FROM rfid_cards WHERE card_id = ?", [id.to_string()])?;
        expect_one(changed, "card", id)
    }

    // === Payments and transfers (read side) ===

    pub fn list_payments(&self) -> Result<Vec<ServicePayment>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM service_payments ORDER BY paid_at DESC, created_at DESC",
            PAYMENT_COLUMNS
        ))?;
        let payments = stmt
            .query_map([], row_to_payment)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(payments)
    }

    pub fn get_payment(&self, id: Uuid) -> Result<Option<ServicePayment>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM service_payments WHERE payment_id = ?",
            PAYMENT_COLUMNS
        );
        optional(conn.query_row(&sql, [id.to_string()], row_to_payment))
    }

    pub fn list_transfers(&self) -> Result<Vec<Transfer>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transfers ORDER BY transferred_at DESC, created_at DESC",
            TRANSFER_COLUMNS
        ))?;
        let transfers = stmt
            .query_map([], row_to_transfer)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(transfers)
    }

    /// Transfers where the account is either side, newest first
    pub fn list_transfers_for_account(&self, account_id: Uuid) -> Result<Vec<Transfer>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM transfers
             WHERE source_account_id = ? OR destination_account_id = ?
             ORDER BY transferred_at DESC, created_at DESC",
            TRANSFER_COLUMNS
        ))?;
        let id = account_id.to_string();
        let transfers = stmt
            .query_map(params![id, id], row_to_transfer)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(transfers)
    }

    /// Transfers joined with account numbers and client names, newest
    /// first; limited to one account when `account_id` is given
    pub fn list_transfer_views(&self, account_id: Option<Uuid>) -> Result<Vec<TransferView>> {
        let conn = self.lock()?;
        let filter = if account_id.is_some() {
            "WHERE t.source_account_id = ? OR t.destination_account_id = ?"
        } else {
            ""
        };
        let mut stmt = conn.prepare(&format!(
            "SELECT t.transfer_id, t.transferred_at, CAST(t.amount AS VARCHAR),
                    t.source_account_id, t.destination_account_id,
                    t.authorizing_user_id, t.created_at,
                    COALESCE(sa.number, ''),
                    COALESCE(sc.first_name || ' ' || sc.last_name, ''),
                    COALESCE(da.number, ''),
                    COALESCE(dc.first_name || ' ' || dc.last_name, '')
             FROM transfers t
             LEFT JOIN accounts sa ON sa.account_id = t.source_account_id
             LEFT JOIN clients sc ON sc.client_id = sa.client_id
             LEFT JOIN accounts da ON da.account_id = t.destination_account_id
             LEFT JOIN clients dc ON dc.client_id = da.client_id
             {}
             ORDER BY t.transferred_at DESC, t.created_at DESC",
            filter
        ))?;
        let rows = match account_id {
            Some(id) => {
                let id = id.to_string();
                stmt.query_map(params![id, id], row_to_transfer_view)?
                    .collect::<duckdb::Result<Vec<_>>>()?
            }
            None => stmt
                .query_map([], row_to_transfer_view)?
                .collect::<duckdb::Result<Vec<_>>>()?,
        };
        Ok(rows)
    }

    pub fn get_transfer(&self, id: Uuid) -> Result<Option<Transfer>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM transfers WHERE transfer_id = ?", TRANSFER_COLUMNS);
        optional(conn.query_row(&sql, [id.to_string()], row_to_transfer))
    }

    // === Roles and users ===

    pub fn list_roles(&self) -> Result<Vec<Role>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT role_id, name, description FROM roles ORDER BY name")?;
        let roles = stmt
            .query_map([], row_to_role)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(roles)
    }

    pub fn get_role(&self, id: Uuid) -> Result<Option<Role>> {
        let conn = self.lock()?;
        optional(conn.query_row(
            "SELECT role_id, name, description FROM roles WHERE role_id = ?",
            [id.to_string()],
            row_to_role,
        ))
    }

    pub fn insert_role(&self, role: &Role) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO roles (role_id, name, description) VALUES (?, ?, ?)",
            params![role.id.to_string(), role.name, role.description],
        )?;
        Ok(())
    }

    pub fn update_role(&self, role: &Role) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE roles SET name = ?, description = ? WHERE role_id = ?",
            params![role.name, role.description, role.id.to_string()],
        )?;
        expect_one(changed, "role", role.id)
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM users ORDER BY username",
            USER_COLUMNS
        ))?;
        let users = stmt
            .query_map([], row_to_user)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(users)
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS);
        optional(conn.query_row(&sql, [id.to_string()], row_to_user))
    }

    pub fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.lock()?;
        let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
        optional(conn.query_row(&sql, [username], row_to_user))
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users (user_id, username, password_hash, role_id, active,
                                created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                user.id.to_string(),
                user.username,
                user.password_hash,
                user.role_id.to_string(),
                user.active,
                format_timestamp(&user.created_at),
                format_timestamp(&user.updated_at),
            ],
        )?;
        Ok(())
    }

    pub fn update_user(&self, user: &User) -> Result<()> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "UPDATE users SET username = ?, password_hash = ?, role_id = ?, active = ?,
                              updated_at = ?
             WHERE user_id = ?",
            params![
                user.username,
                user.password_hash,
                user.role_id.to_string(),
                user.active,
                format_timestamp(&user.updated_at),
                user.id.to_string(),
            ],
        )?;
        expect_one(changed, "user", user.id)
    }

    // === Audit log (read side) ===

    /// Audit entries newest first, optionally narrowed to one entity kind
    pub fn list_audits(&self, entity: Option<&str>, limit: Option<usize>) -> Result<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let mut sql = format!("SELECT {} FROM audit_log", AUDIT_COLUMNS);
        if entity.is_some() {
            sql.push_str(" WHERE entity = ?");
        }
        sql.push_str(" ORDER BY occurred_at DESC, audit_id");
        if let Some(limit) = limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        let mut stmt = conn.prepare(&sql)?;
        let rows = match entity {
            Some(entity) => stmt.query_map([entity], row_to_audit)?,
            None => stmt.query_map([], row_to_audit)?,
        };
        Ok(rows.collect::<duckdb::Result<Vec<_>>>()?)
    }

    /// History of one entity, oldest first
    pub fn list_audits_for_entity(&self, entity: &str, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM audit_log WHERE entity = ? AND entity_id = ?
             ORDER BY occurred_at, audit_id",
            AUDIT_COLUMNS
        ))?;
        let entries = stmt
            .query_map(params![entity, entity_id.to_string()], row_to_audit)?
            .collect::<duckdb::Result<Vec<_>>>()?;
        Ok(entries)
    }

    // === Status ===

    pub fn table_counts(&self) -> Result<TableCounts> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Result<i64> { Ok(conn.query_row(sql, [], |row| row.get(0))?) };

        let total_balance: String = conn.query_row(
            "SELECT CAST(COALESCE(SUM(balance), 0) AS VARCHAR) FROM accounts",
            [],
            |row| row.get(0),
        )?;

        Ok(TableCounts {
            clients: count("SELECT COUNT(*) FROM clients")?,
            accounts: count("SELECT COUNT(*) FROM accounts")?,
            active_accounts: count("SELECT COUNT(*) FROM accounts WHERE active")?,
            total_balance: Decimal::from_str(&total_balance)
                .map_err(|e| Error::database(format!("invalid balance total: {}", e)))?,
            transfers: count("SELECT COUNT(*) FROM transfers")?,
            payments: count("SELECT COUNT(*) FROM service_payments")?,
            audit_entries: count("SELECT COUNT(*) FROM audit_log")?,
        })
    }

    /// Size of the database file in bytes
    pub fn get_db_size(&self) -> Result<u64> {
        Ok(std::fs::metadata(&self.db_path)?.len())
    }
}

impl LedgerStore for DuckDbRepository {
    fn find_account(&self, id: Uuid) -> Result<Option<Account>> {
        self.get_account(id)
    }

    fn atomically<T, E, F>(&self, work: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn LedgerUnit) -> std::result::Result<T, E>,
        E: From<Error>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(Error::from)?;

        let outcome = {
            let mut unit = DuckDbUnit { conn: &tx };
            work(&mut unit)
        };

        match outcome {
            Ok(value) => {
                tx.commit().map_err(Error::from)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::error!("rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

impl AuditRecorder for DuckDbRepository {
    fn append(
        &self,
        action: AuditAction,
        entity: EntityKind,
        entity_id: Uuid,
        user_id: Uuid,
    ) -> Result<AuditEntry> {
        let entry = AuditEntry::new(action, entity, entity_id, user_id);
        let conn = self.lock()?;
        insert_audit(&conn, &entry)?;
        Ok(entry)
    }
}

/// One open DuckDB transaction seen through the ledger port
struct DuckDbUnit<'a> {
    conn: &'a Connection,
}

impl LedgerUnit for DuckDbUnit<'_> {
    fn find_account(&mut self, id: Uuid) -> Result<Option<Account>> {
        query_account(self.conn, id)
    }

    fn find_service_type(&mut self, id: Uuid) -> Result<Option<ServiceType>> {
        query_service_type(self.conn, id)
    }

    fn find_card_by_number(&mut self, card_number: &str) -> Result<Option<RfidCard>> {
        let sql = format!("SELECT {} FROM rfid_cards WHERE card_number = ?", CARD_COLUMNS);
        optional(self.conn.query_row(&sql, [card_number], row_to_card))
    }

    fn apply_delta(&mut self, account_id: Uuid, delta: Decimal) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE accounts SET balance = balance + CAST(? AS DECIMAL(18,2)), updated_at = ?
             WHERE account_id = ?",
            params![
                delta.to_string(),
                format_timestamp(&Utc::now()),
                account_id.to_string(),
            ],
        )?;
        expect_one(changed, "account", account_id)
    }

    fn insert_transfer(&mut self, transfer: &Transfer) -> Result<()> {
        self.conn.execute(
            "INSERT INTO transfers (transfer_id, transferred_at, amount, source_account_id,
                                    destination_account_id, authorizing_user_id, created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18,2)), ?, ?, ?, ?)",
            params![
                transfer.id.to_string(),
                format_timestamp(&transfer.timestamp),
                transfer.amount.to_string(),
                transfer.source_account_id.to_string(),
                transfer.destination_account_id.to_string(),
                transfer.authorizing_user_id.to_string(),
                format_timestamp(&transfer.created_at),
            ],
        )?;
        Ok(())
    }

    fn insert_payment(&mut self, payment: &ServicePayment) -> Result<()> {
        self.conn.execute(
            "INSERT INTO service_payments (payment_id, paid_at, amount, account_id,
                                           service_type_id, card_id, authorizing_user_id,
                                           created_at)
             VALUES (?, ?, CAST(? AS DECIMAL(18,2)), ?, ?, ?, ?, ?)",
            params![
                payment.id.to_string(),
                format_timestamp(&payment.paid_at),
                payment.amount.to_string(),
                payment.account_id.to_string(),
                payment.service_type_id.to_string(),
                payment.card_id.map(|id| id.to_string()),
                payment.authorizing_user_id.to_string(),
                format_timestamp(&payment.created_at),
            ],
        )?;
        Ok(())
    }

    fn append_audit(&mut self, entry: &AuditEntry) -> Result<()> {
        insert_audit(self.conn, entry)
    }
}

// Queries shared by the repository and open units

fn query_account(conn: &Connection, id: Uuid) -> Result<Option<Account>> {
    let sql = format!("SELECT {} FROM accounts WHERE account_id = ?", ACCOUNT_COLUMNS);
    optional(conn.query_row(&sql, [id.to_string()], row_to_account))
}

fn query_service_type(conn: &Connection, id: Uuid) -> Result<Option<ServiceType>> {
    optional(conn.query_row(
        "SELECT service_type_id, name, description FROM service_types
         WHERE service_type_id = ?",
        [id.to_string()],
        row_to_service_type,
    ))
}

fn insert_audit(conn: &Connection, entry: &AuditEntry) -> Result<()> {
    conn.execute(
        "INSERT INTO audit_log (audit_id, occurred_at, action, entity, entity_id, user_id)
         VALUES (?, ?, ?, ?, ?, ?)",
        params![
            entry.id.to_string(),
            format_timestamp(&entry.timestamp),
            entry.action.as_str(),
            entry.entity,
            entry.entity_id.to_string(),
            entry.user_id.to_string(),
        ],
    )?;
    Ok(())
}

// Row mappers

fn row_to_account(row: &Row) -> duckdb::Result<Account> {
    Ok(Account {
        id: get_uuid(row, 0)?,
        number: row.get(1)?,
        client_id: get_uuid(row, 2)?,
        account_type_id: get_uuid(row, 3)?,
        balance: get_decimal(row, 4)?,
        active: row.get(5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

fn row_to_client(row: &Row) -> duckdb::Result<Client> {
    Ok(Client {
        id: get_uuid(row, 0)?,
        first_name: row.get(1)?,
        last_name: row.get(2)?,
        address: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        profile: row.get(6)?,
        active: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

fn row_to_service_type(row: &Row) -> duckdb::Result<ServiceType> {
    Ok(ServiceType {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn row_to_card(row: &Row) -> duckdb::Result<RfidCard> {
    let assigned: String = row.get(3)?;
    Ok(RfidCard {
        id: get_uuid(row, 0)?,
        card_number: row.get(1)?,
        account_id: get_uuid(row, 2)?,
        assigned_on: NaiveDate::parse_from_str(&assigned, "%Y-%m-%d")
            .map_err(|e| conversion_error(3, e))?,
        active: row.get(4)?,
    })
}

fn row_to_payment(row: &Row) -> duckdb::Result<ServicePayment> {
    let card_id: Option<String> = row.get(5)?;
    Ok(ServicePayment {
        id: get_uuid(row, 0)?,
        paid_at: get_timestamp(row, 1)?,
        amount: get_decimal(row, 2)?,
        account_id: get_uuid(row, 3)?,
        service_type_id: get_uuid(row, 4)?,
        card_id: card_id
            .map(|s| Uuid::parse_str(&s).map_err(|e| conversion_error(5, e)))
            .transpose()?,
        authorizing_user_id: get_uuid(row, 6)?,
        created_at: get_timestamp(row, 7)?,
    })
}

fn row_to_transfer(row: &Row) -> duckdb::Result<Transfer> {
    Ok(Transfer {
        id: get_uuid(row, 0)?,
        timestamp: get_timestamp(row, 1)?,
        amount: get_decimal(row, 2)?,
        source_account_id: get_uuid(row, 3)?,
        destination_account_id: get_uuid(row, 4)?,
        authorizing_user_id: get_uuid(row, 5)?,
        created_at: get_timestamp(row, 6)?,
    })
}

/// Transfer columns first, then the four joined name columns
fn row_to_transfer_view(row: &Row) -> duckdb::Result<TransferView> {
    Ok(TransferView {
        transfer: row_to_transfer(row)?,
        source_account_number: row.get(7)?,
        source_client_name: row.get(8)?,
        destination_account_number: row.get(9)?,
        destination_client_name: row.get(10)?,
    })
}

fn row_to_role(row: &Row) -> duckdb::Result<Role> {
    Ok(Role {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

fn row_to_user(row: &Row) -> duckdb::Result<User> {
    Ok(User {
        id: get_uuid(row, 0)?,
        username: row.get(1)?,
        password_hash: row.get(2)?,
        role_id: get_uuid(row, 3)?,
        active: row.get(4)?,
        created_at: get_timestamp(row, 5)?,
        updated_at: get_timestamp(row, 6)?,
    })
}

fn row_to_audit(row: &Row) -> duckdb::Result<AuditEntry> {
    let action: String = row.get(2)?;
    Ok(AuditEntry {
        id: get_uuid(row, 0)?,
        timestamp: get_timestamp(row, 1)?,
        action: AuditAction::from_str(&action).map_err(|e| conversion_error(2, e))?,
        entity: row.get(3)?,
        entity_id: get_uuid(row, 4)?,
        user_id: get_uuid(row, 5)?,
    })
}

// Helper functions

fn optional<T>(result: duckdb::Result<T>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn expect_one(changed: usize, what: &str, id: Uuid) -> Result<()> {
    if changed == 0 {
        return Err(Error::not_found(format!("{} {}", what, id)));
    }
    Ok(())
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> duckdb::Error {
    duckdb::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn get_uuid(row: &Row, idx: usize) -> duckdb::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| conversion_error(idx, e))
}

/// Money columns are read as text so no precision is lost on the way out
fn get_decimal(row: &Row, idx: usize) -> duckdb::Result<Decimal> {
    let s: String = row.get(idx)?;
    Decimal::from_str(&s).map_err(|e| conversion_error(idx, e))
}

fn get_timestamp(row: &Row, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    parse_timestamp(&s).map_err(|e| conversion_error(idx, e))
}

fn parse_timestamp(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s).map(|dt| dt.with_timezone(&Utc))
}

/// Fixed-width UTC text, so lexical order matches chronological order
fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn format_date(date: &NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, DuckDbRepository) {
        let temp_dir = TempDir::new().unwrap();
        let repo = DuckDbRepository::new(&temp_dir.path().join("test.duckdb")).unwrap();
        repo.ensure_schema().unwrap();
        (temp_dir, repo)
    }

    fn seed_account(repo: &DuckDbRepository, number: &str, balance: Decimal) -> Account {
        let client = Client::new("Ana", "Lopez");
        repo.insert_client(&client).unwrap();
        let account_type = AccountType::new(format!("Savings {}", number), None);
        repo.insert_account_type(&account_type).unwrap();
        let account = Account::new(number, client.id, account_type.id, balance);
        repo.insert_account(&account).unwrap();
        account
    }

    #[test]
    fn test_balance_round_trips_exactly() {
        let (_dir, repo) = setup();
        let account = seed_account(&repo, "ACC-1", Decimal::new(100050, 2));

        let loaded = repo.get_account(account.id).unwrap().unwrap();
        assert_eq!(loaded.balance, Decimal::new(100050, 2));
        assert_eq!(loaded.number, "ACC-1");
        assert!(loaded.active);
    }

    #[test]
    fn test_missing_account_is_none() {
        let (_dir, repo) = setup();
        assert!(repo.get_account(Uuid::new_v4()).unwrap().is_none());
    }

    #[test]
    fn test_duplicate_account_number_is_conflict() {
        let (_dir, repo) = setup();
        let first = seed_account(&repo, "ACC-1", Decimal::new(10, 0));
        let duplicate = Account::new("ACC-1", first.client_id, first.account_type_id, Decimal::new(0, 0));

        let err = repo.insert_account(&duplicate).unwrap_err();
        assert!(matches!(err, Error::Conflict(_)), "got {:?}", err);
    }

    #[test]
    fn test_unit_commits_all_writes() {
        let (_dir, repo) = setup();
        let account = seed_account(&repo, "ACC-1", Decimal::new(100, 0));

        repo.atomically(|unit| -> Result<()> {
            unit.apply_delta(account.id, Decimal::new(-4025, 2))?;
            unit.append_audit(&AuditEntry::new(
                AuditAction::Update,
                EntityKind::Account,
                account.id,
                Uuid::new_v4(),
            ))
        })
        .unwrap();

        assert_eq!(repo.get_account(account.id).unwrap().unwrap().balance, Decimal::new(5975, 2));
        assert_eq!(repo.list_audits(None, None).unwrap().len(), 1);
    }

    #[test]
    fn test_unit_rolls_back_on_error() {
        let (_dir, repo) = setup();
        let account = seed_account(&repo, "ACC-1", Decimal::new(100, 0));

        let result: Result<()> = repo.atomically(|unit| {
            unit.apply_delta(account.id, Decimal::new(-40, 0))?;
            Err(Error::validation("abort"))
        });

        assert!(result.is_err());
        assert_eq!(repo.get_account(account.id).unwrap().unwrap().balance, Decimal::new(100, 0));
    }

    #[test]
    fn test_negative_balance_rejected_by_schema() {
        let (_dir, repo) = setup();
        let account = seed_account(&repo, "ACC-1", Decimal::new(10, 0));

        let result: Result<()> = repo.atomically(|unit| unit.apply_delta(account.id, Decimal::new(-1001, 2)));

        assert!(result.is_err());
        assert_eq!(repo.get_account(account.id).unwrap().unwrap().balance, Decimal::new(10, 0));
    }

    #[test]
    fn test_apply_delta_on_missing_account_is_not_found() {
        let (_dir, repo) = setup();
        let result: Result<()> = repo.atomically(|unit| unit.apply_delta(Uuid::new_v4(), Decimal::new(1, 0)));
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_account_views_join_names() {
        let (_dir, repo) = setup();
        let account = seed_account(&repo, "ACC-1", Decimal::new(5, 0));
        repo.set_account_active(account.id, false).unwrap();

        let all = repo.list_account_views(false).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].client_name, "Ana Lopez");
        assert_eq!(all[0].account_type_name, "Savings ACC-1");

        assert!(repo.list_account_views(true).unwrap().is_empty());
    }

    #[test]
    fn test_update_account_leaves_balance_alone() {
        let (_dir, repo) = setup();
        let mut account = seed_account(&repo, "ACC-1", Decimal::new(75, 0));
        account.number = "ACC-9".to_string();
        account.balance = Decimal::new(1000000, 0);
        repo.update_account(&account).unwrap();

        let loaded = repo.get_account(account.id).unwrap().unwrap();
        assert_eq!(loaded.number, "ACC-9");
        assert_eq!(loaded.balance, Decimal::new(75, 0));
    }

    #[test]
    fn test_card_lookup_by_number() {
        let (_dir, repo) = setup();
        let account = seed_account(&repo, "ACC-1", Decimal::new(5, 0));
        let card = RfidCard::new("04:a2:1b:9c", account.id, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        repo.insert_card(&card).unwrap();

        let found = repo
            .atomically(|unit| unit.find_card_by_number("04A21B9C"))
            .unwrap()
            .unwrap();
        assert_eq!(found.id, card.id);
        assert_eq!(found.assigned_on, card.assigned_on);
    }

    #[test]
    fn test_audit_filter_and_limit() {
        let (_dir, repo) = setup();
        let user = Uuid::new_v4();
        for _ in 0..3 {
            repo.append(AuditAction::Create, EntityKind::Client, Uuid::new_v4(), user)
                .unwrap();
        }
        repo.append(AuditAction::Delete, EntityKind::RfidCard, Uuid::new_v4(), user)
            .unwrap();

        assert_eq!(repo.list_audits(None, None).unwrap().len(), 4);
        assert_eq!(repo.list_audits(Some("Client"), None).unwrap().len(), 3);
        assert_eq!(repo.list_audits(Some("Client"), Some(2)).unwrap().len(), 2);
        let cards = repo.list_audits(Some("RfidCard"), None).unwrap();
        assert_eq!(cards[0].action, AuditAction::Delete);
    }

    #[test]
    fn test_table_counts() {
        let (_dir, repo) = setup();
        seed_account(&repo, "ACC-1", Decimal::new(1025, 2));
        seed_account(&repo, "ACC-2", Decimal::new(475, 2));

        let counts = repo.table_counts().unwrap();
        assert_eq!(counts.clients, 2);
        assert_eq!(counts.accounts, 2);
        assert_eq!(counts.active_accounts, 2);
        assert_eq!(counts.total_balance, Decimal::new(1500, 2));
        assert_eq!(counts.transfers, 0);
    }

    #[test]
    fn test_timestamp_format_sorts_lexically() {
        let earlier = DateTime::parse_from_rfc3339("2024-01-02T03:04:05Z")
            .unwrap()
            .with_timezone(&Utc);
        let later = earlier + chrono::Duration::milliseconds(1);
        assert!(format_timestamp(&earlier) < format_timestamp(&later));
        assert_eq!(parse_timestamp(&format_timestamp(&later)).unwrap(), later);
    }
}
