// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Post-deploy tag metadata cleanup.
//!
//! Finder tags stick to Max project files and show up in Live's browser. After
//! each deploy we strip the tag attribute off every project marker file under
//! a known directory tree. Nothing here is allowed to fail a deployment, so
//! every problem is logged and then dropped.

use crate::config::TagCleanupSettings;

use glob::{glob, Pattern};
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    process::Command,
};
use tracing::{debug, instrument, warn};

/// Strip an extended attribute from files matching a glob under a root.
#[derive(Debug, Clone)]
pub struct TagCleaner {
    root: PathBuf,
    pattern: String,
    attribute: String,
}

impl TagCleaner {
    /// Construct new tag cleaner.
    pub fn new(
        root: impl Into<PathBuf>,
        pattern: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            root: root.into(),
            pattern: pattern.into(),
            attribute: attribute.into(),
        }
    }

    /// List marker files that the cleanup would touch.
    ///
    /// Unreadable entries are skipped.
    pub fn marker_files(&self) -> Vec<PathBuf> {
        // INVARIANT: Root is matched literally, only the pattern may glob.
        let root = Pattern::escape(self.root.to_string_lossy().as_ref());
        let pattern = Path::new(&root).join(&self.pattern);
        let pattern = pattern.to_string_lossy();
        let paths = match glob(pattern.as_ref()) {
            Ok(paths) => paths,
            Err(error) => {
                warn!("invalid tag cleanup pattern {pattern:?}: {error}");
                return Vec::new();
            }
        };

        paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(error) => {
                    debug!("skip unreadable entry: {error}");
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect()
    }

    /// Remove tag attribute from every marker file.
    ///
    /// Returns the number of files the attribute was removed from. Files that
    /// never had the attribute count as failures and are only logged.
    #[instrument(skip(self), level = "debug")]
    pub fn run(&self) -> usize {
        let mut cleared = 0;
        for path in self.marker_files() {
            match remove_attribute(&self.attribute, &path) {
                Ok(()) => {
                    debug!("cleared {:?} on {:?}", self.attribute, path.display());
                    cleared += 1;
                }
                Err(error) => debug!("{error}"),
            }
        }

        cleared
    }
}

impl From<&TagCleanupSettings> for TagCleaner {
    fn from(settings: &TagCleanupSettings) -> Self {
        Self::new(
            settings.root.as_path(),
            settings.pattern.as_str(),
            settings.attribute.as_str(),
        )
    }
}

fn remove_attribute(attribute: &str, path: &Path) -> Result<(), std::io::Error> {
    syscall_non_interactive("xattr", [OsStr::new("-d"), OsStr::new(attribute), path.as_os_str()])
        .map(|_| ())
}

fn syscall_non_interactive(
    cmd: impl AsRef<OsStr>,
    args: impl IntoIterator<Item = impl AsRef<OsStr>>,
) -> Result<String, std::io::Error> {
    let output = Command::new(cmd.as_ref()).args(args).output()?;
    let stdout = String::from_utf8_lossy(output.stdout.as_slice()).into_owned();
    let stderr = String::from_utf8_lossy(output.stderr.as_slice()).into_owned();
    let mut message = String::new();

    if !stdout.is_empty() {
        message.push_str(format!("stdout: {stdout}").as_str());
    }

    if !stderr.is_empty() {
        message.push_str(format!("stderr: {stderr}").as_str());
    }

    // INVARIANT: Chomp trailing newlines.
    let message = message
        .strip_suffix("\r\n")
        .or(message.strip_suffix('\n'))
        .map(ToString::to_string)
        .unwrap_or(message);

    if !output.status.success() {
        return Err(std::io::Error::other(format!(
            "command {:?} failed:\n{message}",
            cmd.as_ref()
        )));
    }

    Ok(message)
}
