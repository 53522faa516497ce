// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Deployment history log.
//!
//! Every successful deployment appends one line to a plain text log. The log
//! is created by the user beforehand, never by this tool. Reading the log for
//! display never needs write access.
//!
//! # Record Layout
//!
//! ```text
//! 2020-01-23 14:02:11  [DEV]   Foo-3.amxd --> Foo-DEV.amxd  ("/src/Foo-3.amxd" --> "/dev/Foo-DEV.amxd")
//! ```
//!
//! There is no locking. Two deployments at the same time may interleave.

use crate::deploy::DeployTarget;

use chrono::{Local, NaiveDateTime, Timelike};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::{read_to_string, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
};
use tracing::{debug, instrument};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One deployment in the history log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRecord {
    pub timestamp: NaiveDateTime,
    pub label: String,
    pub source: PathBuf,
    pub destination: PathBuf,
}

impl HistoryRecord {
    /// Construct new record stamped with the current local time.
    pub fn now(
        target: DeployTarget,
        source: impl Into<PathBuf>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        let timestamp = Local::now().naive_local();
        Self {
            // INVARIANT: Second precision only.
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
            label: target.label().into(),
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// Source file name without directory.
    pub fn source_name(&self) -> String {
        file_name_of(&self.source)
    }

    /// Destination file name without directory.
    pub fn destination_name(&self) -> String {
        file_name_of(&self.destination)
    }

    /// Parse one log line back into a record.
    ///
    /// Returns `None` for anything not written in the record layout, e.g.,
    /// lines from older versions of the log.
    pub fn parse_line(line: &str) -> Option<Self> {
        let stamp = line.get(..19)?;
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        let rest = line.get(19..)?.trim_start();

        let (label, rest) = rest.split_once(char::is_whitespace)?;
        if !(label.starts_with('[') && label.ends_with(']')) {
            return None;
        }

        let (_, paths) = rest.trim_start().split_once("  (\"")?;
        let paths = paths.trim_end().strip_suffix("\")")?;
        let (source, destination) = paths.split_once("\" --> \"")?;

        Some(Self {
            timestamp,
            label: label.into(),
            source: source.into(),
            destination: destination.into(),
        })
    }
}

impl Display for HistoryRecord {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        write!(
            fmt,
            "{}  {:<6}  {} --> {}  (\"{}\" --> \"{}\")",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.label,
            self.source_name(),
            self.destination_name(),
            self.source.display(),
            self.destination.display(),
        )
    }
}

/// Append-only deployment history.
#[derive(Debug, Clone)]
pub struct HistoryLog {
    path: PathBuf,
}

impl HistoryLog {
    /// Open existing history log.
    ///
    /// # Errors
    ///
    /// - Return [`HistoryError::Missing`] if the log file does not exist.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_file() {
            return Err(HistoryError::Missing { path });
        }

        Ok(Self { path })
    }

    /// Path to history log.
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }

    /// Append record to end of log.
    ///
    /// # Errors
    ///
    /// - Return [`HistoryError::Append`] if the log cannot be written to.
    #[instrument(skip(self, record), level = "debug")]
    pub fn append(&self, record: &HistoryRecord) -> Result<()> {
        debug!("append history record to {:?}", self.path.display());
        let append_err = |err| HistoryError::Append {
            source: err,
            path: self.path.clone(),
        };

        // INVARIANT: Never create the log, it must already exist.
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .map_err(append_err)?;
        writeln!(file, "{record}").map_err(append_err)?;

        Ok(())
    }

    /// Read last `count` lines of log.
    ///
    /// # Errors
    ///
    /// - Return [`HistoryError::Read`] if the log cannot be read.
    pub fn tail(&self, count: usize) -> Result<Vec<String>> {
        let content = read_to_string(&self.path).map_err(|err| HistoryError::Read {
            source: err,
            path: self.path.clone(),
        })?;
        let lines = content.lines().collect::<Vec<_>>();
        let start = lines.len().saturating_sub(count);

        Ok(lines[start..].iter().map(|line| line.to_string()).collect())
    }
}

/// Render history lines as a table.
///
/// Verbose mode adds full source and destination paths beneath each row.
pub fn render_table(lines: &[String], verbose: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{:<19}  {:<6}  {:<30}    {}\n",
        "Date", "Mode", "Original File", "Deploy File"
    ));
    out.push_str(&format!(
        "{:<19}  {:<6}  {:<30}    {}\n",
        "=".repeat(19),
        "=".repeat(6),
        "=".repeat(30),
        "=".repeat(30)
    ));

    for line in lines {
        match HistoryRecord::parse_line(line) {
            Some(record) => {
                out.push_str(&format!(
                    "{:<19}  {:<6}  {:<30}    {}\n",
                    record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    record.label,
                    record.source_name(),
                    record.destination_name(),
                ));
                if verbose {
                    out.push_str(&format!(
                        "  (\"{}\" --> \"{}\")\n",
                        record.source.display(),
                        record.destination.display()
                    ));
                }
            }
            None => {
                out.push_str(line);
                out.push('\n');
            }
        }
    }

    out
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// History log error types.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    /// Log file has not been set up.
    #[error("history log does not exist at {:?}", path.display())]
    Missing { path: PathBuf },

    /// Log file cannot be appended to.
    #[error("failed to append to history log at {:?}", path.display())]
    Append {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Log file cannot be read from.
    #[error("failed to read history log at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = HistoryError> = std::result::Result<T, E>;
