//! Embedded schema migrations
//!
//! Two independent sets, one per database file in the data directory.
//! Each entry is `(name, sql)`; names are recorded in `sys_migrations` and
//! entries run in list order.

/// banca.duckdb: ledger and administration tables
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_lookup_indexes.sql", include_str!("002_lookup_indexes.sql")),
];

/// logs.duckdb: operational event log
///
/// Shares the bootstrap file so both databases track applied names the
/// same way.
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_event_log.sql", include_str!("logs/001_event_log.sql")),
];
