//! Backup job and cycle tests against a stub pg_dump placed on PATH.
//! No PostgreSQL server is required; the stubs emulate the dump utility's
//! relevant behaviors (clean exit, failure, empty artifact, hang).

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::{Duration, Instant};

use serial_test::serial;
use tempfile::TempDir;

use postgres::backup::LogicalBackupManager;
use postgres::common::{BackupFailure, BackupOutcome, CycleSummary, PostgresConfig};
use postgres::PostgresManager;

/// Writes the artifact named by --file and exits cleanly.
const STUB_OK: &str = r#"#!/bin/sh
file=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--file" ]; then file="$arg"; fi
    prev="$arg"
done
printf 'stub dump contents' > "$file"
exit 0
"#;

/// Writes a valid artifact but reports failure.
const STUB_EXIT_NONZERO: &str = r#"#!/bin/sh
file=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--file" ]; then file="$arg"; fi
    prev="$arg"
done
printf 'stub dump contents' > "$file"
exit 1
"#;

/// Creates an empty artifact and still reports success.
const STUB_EMPTY_ARTIFACT: &str = r#"#!/bin/sh
file=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--file" ]; then file="$arg"; fi
    prev="$arg"
done
: > "$file"
exit 0
"#;

/// Hangs well past any test timeout.
const STUB_HANG: &str = r#"#!/bin/sh
exec sleep 60
"#;

/// Fails for the database named alpha, succeeds for everything else.
const STUB_ALPHA_FAILS: &str = r#"#!/bin/sh
file=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--file" ]; then file="$arg"; fi
    prev="$arg"
done
if [ "$arg" = "alpha" ]; then
    exit 1
fi
printf 'stub dump contents' > "$file"
exit 0
"#;

/// Writes the password it received through the environment into the artifact.
const STUB_ECHO_PASSWORD: &str = r#"#!/bin/sh
file=""
prev=""
for arg in "$@"; do
    if [ "$prev" = "--file" ]; then file="$arg"; fi
    prev="$arg"
done
printf '%s' "$PGPASSWORD" > "$file"
exit 0
"#;

/// Prepends a directory holding a stub pg_dump to PATH, restoring the
/// original value on drop. Tests using this are #[serial]: PATH is
/// process-global.
struct StubPgDump {
    _dir: TempDir,
    original_path: std::ffi::OsString,
}

impl StubPgDump {
    fn install(script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        let stub = dir.path().join("pg_dump");
        fs::write(&stub, script).unwrap();
        fs::set_permissions(&stub, fs::Permissions::from_mode(0o755)).unwrap();

        let original_path = std::env::var_os("PATH").unwrap_or_default();
        let mut paths = vec![dir.path().to_path_buf()];
        paths.extend(std::env::split_paths(&original_path));
        std::env::set_var("PATH", std::env::join_paths(paths).unwrap());

        Self {
            _dir: dir,
            original_path,
        }
    }
}

impl Drop for StubPgDump {
    fn drop(&mut self) {
        std::env::set_var("PATH", &self.original_path);
    }
}

fn test_config() -> PostgresConfig {
    PostgresConfig {
        host: "localhost".to_string(),
        port: 5432,
        database: "postgres".to_string(),
        user: "postgres".to_string(),
        password: Some("secret".to_string()),
        ssl_mode: None,
    }
}

fn runner(backup_dir: &Path, timeout: Duration) -> LogicalBackupManager {
    LogicalBackupManager::new(test_config(), backup_dir.to_path_buf(), timeout)
}

#[tokio::test]
#[serial]
async fn successful_dump_produces_validated_artifact() {
    let _ = env_logger::builder().is_test(true).try_init();
    let _stub = StubPgDump::install(STUB_OK);
    let backups = TempDir::new().unwrap();

    let job = runner(backups.path(), Duration::from_secs(5))
        .backup_database("alpha")
        .await;

    assert_eq!(job.outcome, BackupOutcome::Succeeded);
    assert!(job.artifact_path.exists());
    assert_eq!(job.size_bytes, Some(18));
    assert!(job.finished_at.is_some());
}

#[tokio::test]
#[serial]
async fn nonzero_exit_fails_even_with_valid_artifact() {
    let _stub = StubPgDump::install(STUB_EXIT_NONZERO);
    let backups = TempDir::new().unwrap();

    let job = runner(backups.path(), Duration::from_secs(5))
        .backup_database("alpha")
        .await;

    assert_eq!(
        job.outcome,
        BackupOutcome::Failed(BackupFailure::NonZeroExit)
    );
}

#[tokio::test]
#[serial]
async fn empty_artifact_fails_despite_exit_zero() {
    let _stub = StubPgDump::install(STUB_EMPTY_ARTIFACT);
    let backups = TempDir::new().unwrap();

    let job = runner(backups.path(), Duration::from_secs(5))
        .backup_database("alpha")
        .await;

    assert_eq!(
        job.outcome,
        BackupOutcome::Failed(BackupFailure::MissingArtifact)
    );
    assert_eq!(job.size_bytes, None);
}

#[tokio::test]
#[serial]
async fn hanging_dump_is_killed_at_the_timeout() {
    let _stub = StubPgDump::install(STUB_HANG);
    let backups = TempDir::new().unwrap();

    let started = Instant::now();
    let job = runner(backups.path(), Duration::from_secs(1))
        .backup_database("alpha")
        .await;

    assert_eq!(job.outcome, BackupOutcome::TimedOut);
    // Bounded overhead over the one second budget, nowhere near the stub's
    // sixty second sleep.
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[tokio::test]
#[serial]
async fn cycle_continues_past_a_failing_database() {
    let _stub = StubPgDump::install(STUB_ALPHA_FAILS);
    let backups = TempDir::new().unwrap();

    let manager = PostgresManager::new(
        test_config(),
        backups.path().to_path_buf(),
        7,
        Duration::from_secs(5),
    );
    let databases = vec!["alpha".to_string(), "beta".to_string()];
    let jobs = manager.backup_all(&databases).await;

    assert_eq!(jobs.len(), 2);
    assert_eq!(jobs[0].database, "alpha");
    assert!(!jobs[0].succeeded());
    assert_eq!(jobs[1].database, "beta");
    assert!(jobs[1].succeeded());

    let summary = CycleSummary::from_jobs(&jobs);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
}

#[tokio::test]
#[serial]
async fn password_reaches_the_dump_through_the_environment() {
    let _stub = StubPgDump::install(STUB_ECHO_PASSWORD);
    let backups = TempDir::new().unwrap();

    let job = runner(backups.path(), Duration::from_secs(5))
        .backup_database("alpha")
        .await;

    assert!(job.succeeded());
    assert_eq!(fs::read_to_string(&job.artifact_path).unwrap(), "secret");
}
