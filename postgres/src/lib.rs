pub mod backup;
pub mod cli;
pub mod common;
pub mod enumerator;
pub mod manager;
pub mod retention;
pub mod wrapper;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PostgresError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Purge error: {0}")]
    PurgeError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Missing password")]
    MissingPassword,
}

pub type Result<T> = std::result::Result<T, PostgresError>;

// Re-export key types for convenience
pub use common::{BackupFailure, BackupJob, BackupOutcome, CycleSummary, PostgresConfig};
pub use manager::PostgresManager;
