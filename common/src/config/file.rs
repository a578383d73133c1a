use config::{Config, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Backup scope selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// Logical dump of every eligible database (the default).
    Full,
    /// Dumps restricted to the configured table list.
    Tables,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CustodianConfig {
    pub postgres: PostgresSettings,
}

/// Connection and retention settings for one PostgreSQL server.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Maintenance database used for the listing connection; never backed up.
    pub database: String,
    pub retention_days: i64,
    pub backup_kind: BackupKind,
    /// Tables for [`BackupKind::Tables`]; ignored for full dumps.
    pub specific_tables: Vec<String>,
    /// Where backup artifacts land; a conventional default is used when unset.
    pub backup_path: Option<PathBuf>,
    /// When set, log output goes to a timestamped file in this directory.
    pub log_path: Option<PathBuf>,
    /// Wall-clock budget for one database dump.
    pub timeout_minutes: u64,
}

pub fn load_config() -> Result<CustodianConfig, ConfigError> {
    let config_paths = [
        "/etc/custodian/custodian.toml",
        "~/.config/custodian/custodian.toml",
        "custodian.toml",
    ];

    // Create config builder and apply default values
    let config_builder = Config::builder()
        .set_default("postgres.host", "localhost")?
        .set_default("postgres.port", 5432)?
        .set_default("postgres.username", "postgres")?
        .set_default("postgres.password", "")?
        .set_default("postgres.database", "postgres")?
        .set_default("postgres.retention_days", 7)?
        .set_default("postgres.backup_kind", "full")?
        .set_default("postgres.specific_tables", Vec::<String>::new())?
        .set_default("postgres.backup_path", None::<String>)?
        .set_default("postgres.log_path", None::<String>)?
        .set_default("postgres.timeout_minutes", 30)?;

    // Add config sources
    let config_builder = config_paths.iter().fold(config_builder, |builder, path| {
        let path = shellexpand::full(path).unwrap().into_owned();
        if Path::new(&path).exists() {
            builder.add_source(File::with_name(&path))
        } else {
            builder
        }
    });

    // Build and deserialize
    config_builder.build()?.try_deserialize()
}
