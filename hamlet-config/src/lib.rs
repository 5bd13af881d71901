//! Typed settings for Hamlet, loaded from TOML and `HAMLET__*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

/// Root configuration for a ledger runtime.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LedgerConfig {
    pub primary_context: PrimaryContext,
    pub backend: BackendConfig,
    pub display: DisplayConfig,
    pub audit: AuditConfig,
    pub logging: LoggingConfig,
}

impl LedgerConfig {
    /// Load defaults, then the optional TOML file, then environment overrides
    /// such as `HAMLET__BACKEND__KIND=sqlite`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(true),
            );
        }
        builder = builder.add_source(
            Environment::with_prefix("HAMLET")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        let settings = builder
            .build()
            .context("failed to read ledger configuration")?;
        settings
            .try_deserialize()
            .context("invalid ledger configuration")
    }

    /// Parse configuration from an in-memory TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build()
            .and_then(|settings| settings.try_deserialize::<Self>())
            .context("invalid ledger configuration")
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Memory,
    Sqlite,
}

fn default_true() -> bool {
    true
}

fn default_backend_path() -> PathBuf {
    PathBuf::from("data/balances.db")
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,
    #[serde(default = "default_backend_path")]
    pub path: PathBuf,
    /// Keep a separate balance per context.
    #[serde(default = "default_true")]
    pub partition_by_context: bool,
    /// An inactive backend refuses every payment.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            kind: BackendKind::default(),
            path: default_backend_path(),
            partition_by_context: true,
            active: true,
        }
    }
}

fn default_currency_name() -> String {
    "Dollars".to_string()
}

fn default_currency_name_singular() -> String {
    "Dollar".to_string()
}

fn default_decimal_places() -> u32 {
    2
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DisplayConfig {
    #[serde(default = "default_currency_name")]
    pub currency_name: String,
    #[serde(default = "default_currency_name_singular")]
    pub currency_name_singular: String,
    #[serde(default = "default_decimal_places")]
    pub decimal_places: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            currency_name: default_currency_name(),
            currency_name_singular: default_currency_name_singular(),
            decimal_places: default_decimal_places(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    #[default]
    Tracing,
    Memory,
    Sqlite,
    None,
}

fn default_audit_path() -> PathBuf {
    PathBuf::from("data/transactions.db")
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub kind: AuditKind,
    #[serde(default = "default_audit_path")]
    pub path: PathBuf,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            kind: AuditKind::default(),
            path: default_audit_path(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Name of the context used when nothing more precise is known.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct PrimaryContext(pub String);

impl Default for PrimaryContext {
    fn default() -> Self {
        Self("world".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_use_memory_backend_and_tracing_audit() {
        let cfg = LedgerConfig::default();
        assert_eq!(cfg.backend.kind, BackendKind::Memory);
        assert!(cfg.backend.active);
        assert!(cfg.backend.partition_by_context);
        assert_eq!(cfg.audit.kind, AuditKind::Tracing);
        assert_eq!(cfg.display.decimal_places, 2);
        assert_eq!(cfg.primary_context.0, "world");
    }

    #[test]
    fn partial_toml_keeps_remaining_defaults() {
        let cfg = LedgerConfig::from_toml_str(
            r#"
            primary_context = "overworld"

            [backend]
            kind = "sqlite"
            path = "/var/lib/hamlet/balances.db"
            partition_by_context = false

            [display]
            currency_name = "Crowns"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.backend.kind, BackendKind::Sqlite);
        assert!(!cfg.backend.partition_by_context);
        assert!(cfg.backend.active);
        assert_eq!(cfg.display.currency_name, "Crowns");
        assert_eq!(cfg.display.currency_name_singular, "Dollar");
        assert_eq!(cfg.primary_context.0, "overworld");
        assert_eq!(cfg.audit.kind, AuditKind::Tracing);
    }

    #[test]
    fn load_reads_file() {
        let mut expected = LedgerConfig::default();
        expected.audit.kind = AuditKind::Sqlite;
        expected.audit.path = PathBuf::from("audit.db");
        expected.logging.level = "debug".into();
        expected.logging.json = true;

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        write!(file, "{}", toml::to_string(&expected).unwrap()).unwrap();
        let cfg = LedgerConfig::load(Some(file.path())).unwrap();
        assert_eq!(cfg.audit.kind, AuditKind::Sqlite);
        assert_eq!(cfg.audit.path, PathBuf::from("audit.db"));
        assert_eq!(cfg.logging.level, "debug");
        assert!(cfg.logging.json);
    }

    #[test]
    fn unknown_backend_kind_is_rejected() {
        let err = LedgerConfig::from_toml_str("[backend]\nkind = \"redis\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid ledger configuration"));
    }
}
