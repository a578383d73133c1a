use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::common::{BackupFailure, BackupJob, PostgresConfig};
use crate::wrapper::{PgDump, PgDumpExit, PgDumpOptions};

/// Logical backup manager: runs one pg_dump job per database.
pub struct LogicalBackupManager {
    config: PostgresConfig,
    backup_dir: PathBuf,
    tables: Vec<String>,
    timeout: Duration,
}

impl LogicalBackupManager {
    /// Create a new logical backup manager
    pub fn new(config: PostgresConfig, backup_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            config,
            backup_dir,
            tables: Vec::new(),
            timeout,
        }
    }

    /// Restrict every job to the given tables instead of whole databases.
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    /// Back up one database to a uniquely named artifact.
    ///
    /// Always returns a terminal outcome; a hanging dump is killed when the
    /// budget elapses, so no job is left in progress. Failures never propagate
    /// as errors, the caller reads the outcome and moves on.
    pub async fn backup_database(&self, database: &str) -> BackupJob {
        let mut job = BackupJob::new(database, &self.backup_dir);

        info!("Starting backup of database: {database}");

        let options = PgDumpOptions {
            host: self.config.host.clone(),
            port: self.config.port,
            username: self.config.user.clone(),
            password: self.config.password.clone().unwrap_or_default(),
            database: database.to_string(),
            file: job.artifact_path.clone(),
            tables: self.tables.clone(),
            ..PgDumpOptions::default()
        };

        match PgDump::run(&options, self.timeout).await {
            Ok(PgDumpExit::Completed(status)) => {
                // The artifact is checked regardless of the reported exit code:
                // pg_dump can exit 0 and still leave a truncated or empty file.
                let artifact_size = validate_artifact(&job.artifact_path);

                match (status.code(), artifact_size) {
                    (Some(0), Some(size)) => {
                        job.complete(size);
                        info!("Successfully backed up database: {database} ({size} bytes)");
                    }
                    (Some(0), None) => {
                        let message = format!(
                            "backup file {} is empty or does not exist",
                            job.artifact_path.display()
                        );
                        error!("Backup of {database} produced no artifact: {message}");
                        job.fail(BackupFailure::MissingArtifact, message);
                    }
                    (code, _) => {
                        error!("Backup failed for database: {database} (exit code {code:?})");
                        job.fail(
                            BackupFailure::NonZeroExit,
                            format!("pg_dump exited with {status}"),
                        );
                    }
                }
            }
            Ok(PgDumpExit::TimedOut) => {
                // The partial artifact, if any, is left in place for
                // diagnostics; retention removes it eventually.
                error!(
                    "Backup timed out for database: {database} after {}s",
                    self.timeout.as_secs()
                );
                job.time_out();
            }
            Err(e) => {
                error!("Error backing up database {database}: {e:#}");
                job.fail(BackupFailure::Process, format!("{e:#}"));
            }
        }

        job
    }
}

/// Returns the artifact size when the file exists and is non-empty.
///
/// A zero-byte artifact counts as absent: some pg_dump failure modes create
/// the destination file before dying.
fn validate_artifact(path: &Path) -> Option<u64> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.is_file() && metadata.len() > 0 => Some(metadata.len()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn missing_artifact_is_invalid() {
        let dir = TempDir::new().unwrap();
        assert_eq!(validate_artifact(&dir.path().join("absent.backup")), None);
    }

    #[test]
    fn empty_artifact_is_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.backup");
        fs::File::create(&path).unwrap();
        assert_eq!(validate_artifact(&path), None);
    }

    #[test]
    fn non_empty_artifact_reports_its_size() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("alpha.backup");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"dump contents").unwrap();
        assert_eq!(validate_artifact(&path), Some(13));
    }
}
