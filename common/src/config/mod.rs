mod file;

pub use file::{load_config, BackupKind, CustodianConfig, PostgresSettings};
