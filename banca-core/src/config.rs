//! Configuration management
//!
//! Settings live in `settings.json` in the data directory:
//! ```json
//! {
//!   "server": { "host": "127.0.0.1", "port": 3000 },
//!   "audit": { "transferAudit": "durable" },
//!   "database": { "file": "banca.duckdb" }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_DB_FILE: &str = "banca.duckdb";

/// When the audit entry of a transfer is written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransferAuditPolicy {
    /// Inside the transfer's atomic unit: a failed audit write fails the transfer
    #[default]
    Durable,
    /// After commit: a failed audit write is logged and the transfer stands
    BestEffort,
}

impl TransferAuditPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Durable => "durable",
            Self::BestEffort => "bestEffort",
        }
    }
}

impl fmt::Display for TransferAuditPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransferAuditPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "durable" => Ok(Self::Durable),
            "besteffort" | "best_effort" | "best-effort" => Ok(Self::BestEffort),
            other => Err(Error::Config(format!("unknown transfer audit policy: {}", other))),
        }
    }
}

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    server: ServerSection,
    #[serde(default)]
    audit: AuditSection,
    #[serde(default)]
    database: DatabaseSection,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuditSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    transfer_audit: Option<TransferAuditPolicy>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DatabaseSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    file: Option<String>,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

/// Banca configuration (resolved view of settings.json plus environment)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub transfer_audit: TransferAuditPolicy,
    /// Database file name, relative to the data directory
    pub database_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            transfer_audit: TransferAuditPolicy::default(),
            database_file: DEFAULT_DB_FILE.to_string(),
        }
    }
}

impl Config {
    /// Load config from the data directory
    ///
    /// A missing settings file yields defaults. Environment variables
    /// `BANCA_HOST`, `BANCA_PORT` and `BANCA_TRANSFER_AUDIT` override the file.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let raw = read_settings(data_dir)?;
        let defaults = Config::default();

        let mut config = Self {
            host: raw.server.host.unwrap_or(defaults.host),
            port: raw.server.port.unwrap_or(defaults.port),
            transfer_audit: raw.audit.transfer_audit.unwrap_or(defaults.transfer_audit),
            database_file: raw.database.file.unwrap_or(defaults.database_file),
        };

        if let Ok(host) = std::env::var("BANCA_HOST") {
            if !host.trim().is_empty() {
                config.host = host.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("BANCA_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("BANCA_PORT is not a valid port: {}", port)))?;
        }
        if let Ok(policy) = std::env::var("BANCA_TRANSFER_AUDIT") {
            config.transfer_audit = policy.parse()?;
        }

        Ok(config)
    }

    /// Save config to the data directory, preserving settings this crate
    /// does not manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let mut settings = read_settings(data_dir)?;

        settings.server.host = Some(self.host.clone());
        settings.server.port = Some(self.port);
        settings.audit.transfer_audit = Some(self.transfer_audit);
        settings.database.file = Some(self.database_file.clone());

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(data_dir.join("settings.json"), content)?;
        Ok(())
    }

    /// Address the API server binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn read_settings(data_dir: &Path) -> Result<SettingsFile> {
    let settings_path = data_dir.join("settings.json");
    if !settings_path.exists() {
        return Ok(SettingsFile::default());
    }
    let content = std::fs::read_to_string(&settings_path)?;
    serde_json::from_str(&content)
        .map_err(|e| Error::Config(format!("invalid {}: {}", settings_path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let raw = read_settings(dir.path()).unwrap();
        assert!(raw.server.host.is_none());
        assert!(raw.audit.transfer_audit.is_none());

        let config = Config::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.transfer_audit, TransferAuditPolicy::Durable);
        assert_eq!(config.database_file, "banca.duckdb");
    }

    #[test]
    fn test_reads_camel_case_settings() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"server":{"port":8080},"audit":{"transferAudit":"bestEffort"}}"#,
        )
        .unwrap();

        let raw = read_settings(dir.path()).unwrap();
        assert_eq!(raw.server.port, Some(8080));
        assert_eq!(raw.audit.transfer_audit, Some(TransferAuditPolicy::BestEffort));
    }

    #[test]
    fn test_save_preserves_unknown_keys() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join("settings.json"),
            r#"{"frontend":{"theme":"dark"},"server":{"port":9000,"tls":false}}"#,
        )
        .unwrap();

        let config = Config {
            port: 9001,
            ..Config::default()
        };
        config.save(dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["frontend"]["theme"], "dark");
        assert_eq!(json["server"]["tls"], false);
        assert_eq!(json["server"]["port"], 9001);
        assert_eq!(json["audit"]["transferAudit"], "durable");
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("settings.json"), "{not json").unwrap();
        assert!(matches!(read_settings(dir.path()), Err(Error::Config(_))));
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("durable".parse::<TransferAuditPolicy>().unwrap(), TransferAuditPolicy::Durable);
        assert_eq!(
            "best-effort".parse::<TransferAuditPolicy>().unwrap(),
            TransferAuditPolicy::BestEffort
        );
        assert!("sometimes".parse::<TransferAuditPolicy>().is_err());
    }
}
