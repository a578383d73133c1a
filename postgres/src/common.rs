use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Represents a PostgreSQL server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    /// Maintenance database used for the listing connection; never backed up.
    pub database: String,
    pub user: String,
    pub password: Option<String>,
    pub ssl_mode: Option<String>,
}

impl PostgresConfig {
    pub fn connection_string(&self) -> String {
        let mut conn_string = format!(
            "host={} port={} dbname={} user={}",
            self.host, self.port, self.database, self.user
        );

        if let Some(password) = &self.password {
            conn_string.push_str(&format!(" password={password}"));
        }

        if let Some(ssl_mode) = &self.ssl_mode {
            conn_string.push_str(&format!(" sslmode={ssl_mode}"));
        }

        conn_string
    }
}

/// Cause of a failed backup job, for logging. Callers treat every failure the
/// same way: log it and move on to the next database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupFailure {
    /// The dump process could not be spawned or waited on.
    Process,
    /// The dump process exited with a nonzero code or was killed by a signal.
    NonZeroExit,
    /// The artifact is missing or empty, regardless of the reported exit code.
    MissingArtifact,
}

/// Terminal state of one backup job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackupOutcome {
    InProgress,
    Succeeded,
    Failed(BackupFailure),
    TimedOut,
}

/// One database's backup attempt within a cycle.
///
/// Created the moment the runner begins a database; the outcome is set exactly
/// once, when the job terminates. Jobs are never reused across databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: Uuid,
    pub database: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub artifact_path: PathBuf,
    pub size_bytes: Option<u64>,
    pub error_message: Option<String>,
    pub outcome: BackupOutcome,
}

impl BackupJob {
    pub fn new(database: &str, backup_dir: &Path) -> Self {
        let started_at = Utc::now();
        let artifact_path = backup_dir.join(artifact_file_name(database, started_at));

        Self {
            id: Uuid::new_v4(),
            database: database.to_string(),
            started_at,
            finished_at: None,
            artifact_path,
            size_bytes: None,
            error_message: None,
            outcome: BackupOutcome::InProgress,
        }
    }

    pub fn complete(&mut self, size_bytes: u64) {
        self.outcome = BackupOutcome::Succeeded;
        self.finished_at = Some(Utc::now());
        self.size_bytes = Some(size_bytes);
    }

    pub fn fail(&mut self, failure: BackupFailure, error_message: String) {
        self.outcome = BackupOutcome::Failed(failure);
        self.finished_at = Some(Utc::now());
        self.error_message = Some(error_message);
    }

    pub fn time_out(&mut self) {
        self.outcome = BackupOutcome::TimedOut;
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        self.outcome == BackupOutcome::Succeeded
    }
}

/// Unique artifact name for one database and job start time.
pub fn artifact_file_name(database: &str, at: DateTime<Utc>) -> String {
    format!("{}_{}.backup", database, at.format("%Y%m%d_%H%M%S"))
}

/// Result counts for one backup cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl CycleSummary {
    pub fn from_jobs(jobs: &[BackupJob]) -> Self {
        let succeeded = jobs.iter().filter(|job| job.succeeded()).count();
        Self {
            total: jobs.len(),
            succeeded,
            failed: jobs.len() - succeeded,
        }
    }
}
