use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{ChildStderr, ChildStdout, Command};
use tokio::task::JoinHandle;

/// Format options for pg_dump
pub enum PgDumpFormat {
    Plain,
    Custom,
    Directory,
    Tar,
}

impl PgDumpFormat {
    fn as_str(&self) -> &'static str {
        match self {
            PgDumpFormat::Plain => "p",
            PgDumpFormat::Custom => "c",
            PgDumpFormat::Directory => "d",
            PgDumpFormat::Tar => "t",
        }
    }
}

/// Options for pg_dump command
pub struct PgDumpOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub file: PathBuf,
    pub format: PgDumpFormat,
    pub blobs: bool,
    pub verbose: bool,
    pub tables: Vec<String>,
}

impl Default for PgDumpOptions {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            username: "postgres".to_string(),
            password: "".to_string(),
            database: "postgres".to_string(),
            file: PathBuf::from("dump.backup"),
            format: PgDumpFormat::Custom,
            blobs: true,
            verbose: true,
            tables: Vec::new(),
        }
    }
}

/// How a pg_dump run ended.
#[derive(Debug)]
pub enum PgDumpExit {
    /// The process exited on its own with the given status.
    Completed(ExitStatus),
    /// The budget elapsed and the process was killed.
    TimedOut,
}

/// Wrapper for pg_dump command
pub struct PgDump;

impl PgDump {
    /// Run pg_dump with the given options under a wall-clock budget.
    ///
    /// Both output streams are drained line-by-line while the process runs;
    /// leaving either pipe full would stall pg_dump indefinitely. stdout lines
    /// are logged as progress, stderr lines are classified (pg_dump emits
    /// routine progress on stderr under --verbose). On timeout the process is
    /// killed, not asked to shut down. The readers are joined before this
    /// returns on every path, so no output lines are dropped and no reader
    /// outlives its process.
    pub async fn run(options: &PgDumpOptions, timeout: Duration) -> Result<PgDumpExit> {
        let mut cmd = build_command(options);

        debug!(
            "Running pg_dump for database {} -> {}",
            options.database,
            options.file.display()
        );

        let mut child = cmd.spawn().context("Failed to execute pg_dump")?;

        let stdout = child
            .stdout
            .take()
            .context("pg_dump stdout was not captured")?;
        let stderr = child
            .stderr
            .take()
            .context("pg_dump stderr was not captured")?;

        let stdout_reader = spawn_stdout_reader(stdout, options.database.clone());
        let stderr_reader = spawn_stderr_reader(stderr, options.database.clone());

        let exit = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status
                .context("Failed to wait for pg_dump")
                .map(PgDumpExit::Completed),
            Err(_) => {
                warn!(
                    "pg_dump for database {} exceeded its {}s budget, killing it",
                    options.database,
                    timeout.as_secs()
                );
                child
                    .kill()
                    .await
                    .context("Failed to kill timed out pg_dump")
                    .map(|_| PgDumpExit::TimedOut)
            }
        };

        // Process exit (or kill) closes its pipes, so both readers terminate
        // here. Join them even on the error paths.
        let _ = stdout_reader.await;
        let _ = stderr_reader.await;

        exit
    }

    /// Check if pg_dump is available in the system
    pub async fn check_availability() -> Result<()> {
        let output = Command::new("pg_dump")
            .arg("--version")
            .output()
            .await
            .context("Failed to execute pg_dump")?;

        if !output.status.success() {
            anyhow::bail!("pg_dump is not available");
        }

        let version = String::from_utf8_lossy(&output.stdout);
        debug!("pg_dump version: {version}");

        Ok(())
    }
}

fn build_command(options: &PgDumpOptions) -> Command {
    let mut cmd = Command::new("pg_dump");

    // The password goes through the environment, never the command line,
    // where it would show up in process listings.
    cmd.env("PGPASSWORD", &options.password);

    cmd.arg("--host")
        .arg(&options.host)
        .arg("--port")
        .arg(options.port.to_string())
        .arg("--username")
        .arg(&options.username)
        .arg("--format")
        .arg(options.format.as_str())
        .arg("--file")
        .arg(&options.file);

    if options.blobs {
        cmd.arg("--blobs");
    }

    if options.verbose {
        cmd.arg("--verbose");
    }

    for table in &options.tables {
        cmd.arg("--table").arg(table);
    }

    cmd.arg(&options.database);

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    cmd
}

fn spawn_stdout_reader(stdout: ChildStdout, database: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            info!("[{database}] {line}");
        }
    })
}

fn spawn_stderr_reader(stderr: ChildStderr, database: String) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if is_error_line(&line) {
                warn!("[{database}] {line}");
            } else {
                debug!("[{database}] {line}");
            }
        }
    })
}

/// Heuristic classification of a pg_dump stderr line. Approximate by nature:
/// it matches English words emitted by current pg_dump versions.
fn is_error_line(line: &str) -> bool {
    let line = line.to_ascii_lowercase();
    line.contains("error") || line.contains("fatal") || line.contains("failed")
}
