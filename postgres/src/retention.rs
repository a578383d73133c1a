use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use regex::Regex;
use std::fs;
use std::path::PathBuf;

use crate::PostgresError;

/// Which file timestamp drives the age comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeSource {
    /// File creation time, falling back to modification time on filesystems
    /// that do not record a birth time.
    Created,
    /// File modification time.
    Modified,
}

/// A retention purge over one directory.
pub struct PurgeOptions {
    pub directory: PathBuf,
    /// Matched against the file name, not the full path.
    pub pattern: Regex,
    pub retention_days: i64,
    pub age_source: AgeSource,
}

/// Deletes files matching the pattern that are older than the retention
/// window. Returns the number of files deleted.
pub fn purge(options: &PurgeOptions) -> Result<usize, PostgresError> {
    let cutoff = Utc::now() - Duration::days(options.retention_days);
    purge_older_than(options, cutoff)
}

/// Like [`purge`] with an explicit cutoff. Only files stamped strictly before
/// the cutoff are deleted; a file stamped exactly at it is kept.
///
/// A single file failing to delete is logged and skipped, the rest of the
/// directory is still processed. Purging an empty directory, or one with no
/// matching files, deletes nothing and is not an error.
pub fn purge_older_than(
    options: &PurgeOptions,
    cutoff: DateTime<Utc>,
) -> Result<usize, PostgresError> {
    info!(
        "Purging files older than {cutoff} in {}",
        options.directory.display()
    );

    let entries = fs::read_dir(&options.directory)?;

    let mut deleted = 0;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to read directory entry: {e}");
                continue;
            }
        };

        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };
        if !options.pattern.is_match(name) {
            continue;
        }

        let timestamp = match age_timestamp(&entry, options.age_source) {
            Ok(Some(timestamp)) => timestamp,
            // Not a regular file; subdirectories are never purged.
            Ok(None) => continue,
            Err(e) => {
                warn!("Failed to read metadata for {name}: {e}");
                continue;
            }
        };

        if timestamp < cutoff {
            match fs::remove_file(entry.path()) {
                Ok(()) => {
                    info!("Deleted old file: {name}");
                    deleted += 1;
                }
                Err(e) => warn!("Failed to delete {name}: {e}"),
            }
        } else {
            debug!("Keeping {name}: within retention window");
        }
    }

    Ok(deleted)
}

fn age_timestamp(
    entry: &fs::DirEntry,
    source: AgeSource,
) -> std::io::Result<Option<DateTime<Utc>>> {
    let metadata = entry.metadata()?;
    if !metadata.is_file() {
        return Ok(None);
    }

    let time = match source {
        AgeSource::Created => metadata.created().or_else(|_| metadata.modified())?,
        AgeSource::Modified => metadata.modified()?,
    };

    Ok(Some(DateTime::<Utc>::from(time)))
}
