use log::{info, warn};
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use crate::backup::LogicalBackupManager;
use crate::common::{BackupJob, BackupOutcome, CycleSummary, PostgresConfig};
use crate::enumerator;
use crate::retention::{self, AgeSource, PurgeOptions};
use crate::PostgresError;

/// Filename pattern for backup artifacts, as named by the logical backup
/// manager.
pub const BACKUP_FILE_PATTERN: &str = r"\.backup$";

/// Main manager for backup cycles against one PostgreSQL server
pub struct PostgresManager {
    pub config: PostgresConfig,
    backup_dir: PathBuf,
    retention_days: i64,
    job_timeout: Duration,
    tables: Vec<String>,
}

impl PostgresManager {
    pub fn new(
        config: PostgresConfig,
        backup_dir: PathBuf,
        retention_days: i64,
        job_timeout: Duration,
    ) -> Self {
        Self {
            config,
            backup_dir,
            retention_days,
            job_timeout,
            tables: Vec::new(),
        }
    }

    /// Restrict dumps to the given tables instead of whole databases.
    pub fn with_tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    /// Run one end-to-end backup cycle: enumerate databases, back up each in
    /// order, then purge artifacts older than the retention window.
    pub async fn run_backup_cycle(&self) -> Result<CycleSummary, PostgresError> {
        info!("Starting backup cycle");

        if self.config.password.is_none() {
            return Err(PostgresError::MissingPassword);
        }

        // Create backup directory if it doesn't exist
        if !self.backup_dir.exists() {
            fs::create_dir_all(&self.backup_dir)?;
        }

        let databases = enumerator::list_databases(&self.config).await?;

        let jobs = self.backup_all(&databases).await;
        let summary = CycleSummary::from_jobs(&jobs);

        // The cycle already ran its jobs; a purge problem is reported but does
        // not turn the cycle into a failure.
        match self.purge_old_backups() {
            Ok(deleted) => info!("Purged {deleted} expired backup files"),
            Err(e) => warn!("Failed to purge old backups: {e}"),
        }

        info!(
            "Backup cycle finished: {} total, {} succeeded, {} failed",
            summary.total, summary.succeeded, summary.failed
        );
        Ok(summary)
    }

    /// Back up every listed database sequentially, in listing order.
    ///
    /// Dumps are never run concurrently: pg_dump already saturates server-side
    /// I/O and connection slots for one database, and serial jobs keep failure
    /// attribution unambiguous. One database failing never blocks the rest.
    pub async fn backup_all(&self, databases: &[String]) -> Vec<BackupJob> {
        let runner = LogicalBackupManager::new(
            self.config.clone(),
            self.backup_dir.clone(),
            self.job_timeout,
        )
        .with_tables(self.tables.clone());

        let mut jobs = Vec::with_capacity(databases.len());
        for database in databases {
            let job = runner.backup_database(database).await;
            match job.outcome {
                BackupOutcome::Succeeded => {}
                _ => info!("Continuing cycle after failed backup of {database}"),
            }
            jobs.push(job);
        }

        jobs
    }

    /// Purge backup artifacts older than the retention window.
    pub fn purge_old_backups(&self) -> Result<usize, PostgresError> {
        let pattern = Regex::new(BACKUP_FILE_PATTERN)
            .map_err(|e| PostgresError::PurgeError(e.to_string()))?;

        let options = PurgeOptions {
            directory: self.backup_dir.clone(),
            pattern,
            retention_days: self.retention_days,
            age_source: AgeSource::Created,
        };
        retention::purge(&options)
    }
}
