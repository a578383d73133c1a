use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{info, warn};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use common::config::{load_config, BackupKind, PostgresSettings};
use postgres::cli::BackupCommands;
use postgres::manager::BACKUP_FILE_PATTERN;
use postgres::retention::{self, AgeSource, PurgeOptions};
use postgres::wrapper::PgDump;
use postgres::{PostgresConfig, PostgresManager};

/// Log files older than this many days are removed after a cycle.
const LOG_RETENTION_DAYS: i64 = 30;
const LOG_FILE_PATTERN: &str = r"^backup_log_.*\.txt$";

#[derive(Parser, Debug)]
#[clap(
    name = "custodian",
    about = "Automated PostgreSQL logical backup and retention",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: BackupCommands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = load_config()
        .context("Failed to load configuration")?
        .postgres;

    match cli.command {
        BackupCommands::Cycle {
            host,
            port,
            user,
            password,
            database,
            backup_dir,
            retention_days,
            timeout_minutes,
            tables,
            log_dir,
        } => {
            if let Some(host) = host {
                settings.host = host;
            }
            if let Some(port) = port {
                settings.port = port;
            }
            if let Some(user) = user {
                settings.username = user;
            }
            if let Some(password) = password {
                settings.password = password;
            }
            if let Some(database) = database {
                settings.database = database;
            }
            if let Some(backup_dir) = backup_dir {
                settings.backup_path = Some(backup_dir);
            }
            if let Some(retention_days) = retention_days {
                settings.retention_days = retention_days;
            }
            if let Some(timeout_minutes) = timeout_minutes {
                settings.timeout_minutes = timeout_minutes;
            }
            if !tables.is_empty() {
                settings.backup_kind = BackupKind::Tables;
                settings.specific_tables = tables;
            }
            let log_dir = log_dir.or_else(|| settings.log_path.clone());

            init_logging(log_dir.as_deref())?;
            log_effective_settings(&settings);

            PgDump::check_availability().await?;

            let backup_dir = settings
                .backup_path
                .clone()
                .unwrap_or_else(|| PathBuf::from("./backups"));
            info!("Backup directory: {}", backup_dir.display());

            let config = PostgresConfig {
                host: settings.host.clone(),
                port: settings.port,
                database: settings.database.clone(),
                user: settings.username.clone(),
                password: (!settings.password.is_empty()).then(|| settings.password.clone()),
                ssl_mode: None,
            };

            let mut manager = PostgresManager::new(
                config,
                backup_dir,
                settings.retention_days,
                Duration::from_secs(settings.timeout_minutes * 60),
            );
            if settings.backup_kind == BackupKind::Tables {
                manager = manager.with_tables(settings.specific_tables.clone());
            }

            let summary = manager.run_backup_cycle().await?;
            info!(
                "Backup process completed: {}/{} databases backed up",
                summary.succeeded, summary.total
            );

            if let Some(log_dir) = log_dir {
                purge_old_logs(&log_dir)?;
            }
        }

        BackupCommands::Purge {
            backup_dir,
            retention_days,
        } => {
            init_logging(None)?;

            let directory = backup_dir
                .or(settings.backup_path)
                .unwrap_or_else(|| PathBuf::from("./backups"));

            let options = PurgeOptions {
                directory,
                pattern: Regex::new(BACKUP_FILE_PATTERN).context("invalid backup file pattern")?,
                retention_days: retention_days.unwrap_or(settings.retention_days),
                age_source: AgeSource::Created,
            };
            let deleted = retention::purge(&options)?;
            info!("Purged {deleted} expired backup files");
        }
    }

    Ok(())
}

/// Sets up the logger, writing to a timestamped file under `log_dir` when one
/// is given and to stderr otherwise.
fn init_logging(log_dir: Option<&Path>) -> Result<()> {
    let mut builder = env_logger::Builder::from_default_env();
    builder
        .format_timestamp_secs()
        .format_level(true)
        .format_module_path(false)
        .filter_level(log::LevelFilter::Info);

    if let Some(log_dir) = log_dir {
        fs::create_dir_all(log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let path = log_dir.join(format!(
            "backup_log_{}.txt",
            Utc::now().format("%Y%m%d_%H%M%S")
        ));
        let file = fs::File::create(&path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }

    builder.try_init()?;
    Ok(())
}

fn log_effective_settings(settings: &PostgresSettings) {
    info!("Starting PostgreSQL backup process");
    info!("Host: {}", settings.host);
    info!("Port: {}", settings.port);
    info!("Username: {}", settings.username);
    info!("Database: {}", settings.database);
    info!("Backup kind: {:?}", settings.backup_kind);
    info!("Retention days: {}", settings.retention_days);
    info!("Job timeout: {} minutes", settings.timeout_minutes);
}

/// Removes log files past the fixed retention window. The freshly opened log
/// file is by definition inside the window.
fn purge_old_logs(log_dir: &Path) -> Result<()> {
    let options = PurgeOptions {
        directory: log_dir.to_path_buf(),
        pattern: Regex::new(LOG_FILE_PATTERN).context("invalid log file pattern")?,
        retention_days: LOG_RETENTION_DAYS,
        age_source: AgeSource::Created,
    };

    match retention::purge(&options) {
        Ok(deleted) => info!("Purged {deleted} old log files"),
        Err(e) => warn!("Failed to purge old log files: {e}"),
    }

    Ok(())
}
