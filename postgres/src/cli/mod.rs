use std::path::PathBuf;

/// Backup subcommands. Flags given here override the configuration file.
#[derive(clap::Subcommand, Debug)]
pub enum BackupCommands {
    /// Run one backup cycle: enumerate databases, dump each, purge old backups
    Cycle {
        /// PostgreSQL host
        #[clap(long)]
        host: Option<String>,

        /// PostgreSQL port
        #[clap(long)]
        port: Option<u16>,

        /// PostgreSQL user
        #[clap(long)]
        user: Option<String>,

        /// PostgreSQL password (prefer the configuration file over this flag)
        #[clap(long)]
        password: Option<String>,

        /// Maintenance database used to list the server's databases
        #[clap(long)]
        database: Option<String>,

        /// Directory backup artifacts are written to
        #[clap(long)]
        backup_dir: Option<PathBuf>,

        /// Days to keep backup artifacts
        #[clap(long)]
        retention_days: Option<i64>,

        /// Wall-clock budget for one database dump, in minutes
        #[clap(long)]
        timeout_minutes: Option<u64>,

        /// Restrict dumps to this table (repeatable)
        #[clap(long = "table")]
        tables: Vec<String>,

        /// Directory for log files; logs go to stderr when unset
        #[clap(long)]
        log_dir: Option<PathBuf>,
    },

    /// Purge expired backup artifacts without running new backups
    Purge {
        /// Directory backup artifacts are written to
        #[clap(long)]
        backup_dir: Option<PathBuf>,

        /// Days to keep backup artifacts
        #[clap(long)]
        retention_days: Option<i64>,
    },
}
