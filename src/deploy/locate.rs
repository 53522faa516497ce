// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Build artifact lookup.
//!
//! Builds land in the source directory as `<trunk>-<version>.amxd`, one file
//! per version. The locator either picks the most recently modified build of
//! a trunk, or takes an explicit filename at face value.

use regex::Regex;
use std::{
    fs::read_dir,
    path::{Path, PathBuf},
    time::SystemTime,
};
use tracing::{debug, instrument};

/// Resolve build artifacts inside a source directory.
#[derive(Clone, Debug)]
pub struct Locator {
    source_dir: PathBuf,
}

impl Locator {
    /// Construct new locator over target source directory.
    pub fn new(source_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
        }
    }

    /// Source directory being searched.
    pub fn source_dir(&self) -> &Path {
        self.source_dir.as_path()
    }

    /// Find the most recently modified build of a trunk.
    ///
    /// Entries are ordered by modification time, newest first, and the first
    /// name matching `<trunk>-<version>.amxd` wins. The trunk is matched
    /// literally, so names like `Mod+[x2]` are safe.
    ///
    /// # Errors
    ///
    /// - Return [`LocateError::ReadSourceDir`] if the source directory cannot
    ///   be listed.
    /// - Return [`LocateError::NoMatch`] if no entry matches the trunk.
    #[instrument(skip(self), level = "debug")]
    pub fn latest(&self, trunk: &str) -> Result<PathBuf> {
        let read_err = |err| LocateError::ReadSourceDir {
            source: err,
            source_dir: self.source_dir.clone(),
        };

        let mut entries = Vec::new();
        for entry in read_dir(&self.source_dir).map_err(read_err)? {
            let entry = entry.map_err(read_err)?;
            let modified = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map_err(read_err)?;
            entries.push((entry.file_name().to_string_lossy().into_owned(), modified));
        }

        let found = select_latest(trunk, entries)?;
        debug!("latest build of {trunk:?} is {found:?}");

        Ok(self.source_dir.join(found))
    }

    /// Resolve an explicit filename inside the source directory.
    ///
    /// Does not check that the file exists. A missing source surfaces when
    /// the copy is attempted.
    pub fn explicit(&self, file_name: impl AsRef<Path>) -> PathBuf {
        self.source_dir.join(file_name)
    }
}

/// Pick newest entry whose name is a versioned build of target trunk.
///
/// Ties on modification time keep directory listing order.
///
/// # Errors
///
/// - Return [`LocateError::NoMatch`] if nothing matches.
pub fn select_latest(
    trunk: &str,
    entries: impl IntoIterator<Item = (String, SystemTime)>,
) -> Result<String> {
    let pattern = artifact_pattern(trunk)?;
    let mut entries = entries.into_iter().collect::<Vec<_>>();
    entries.sort_by(|(_, lhs), (_, rhs)| rhs.cmp(lhs));

    entries
        .into_iter()
        .map(|(name, _)| name)
        .find(|name| pattern.is_match(name))
        .ok_or_else(|| LocateError::NoMatch {
            trunk: trunk.to_string(),
        })
}

/// Build matcher for `<trunk>-<version>.amxd`.
///
/// The version token is one or more word characters or dots.
///
/// # Errors
///
/// - Return [`LocateError::Pattern`] if the matcher cannot be compiled.
pub fn artifact_pattern(trunk: &str) -> Result<Regex> {
    // INVARIANT: Escape entire trunk so it only ever matches literally.
    Ok(Regex::new(&format!(
        r"^{}-[\w.]+\.amxd$",
        regex::escape(trunk)
    ))?)
}

/// Build artifact lookup error types.
#[derive(Debug, thiserror::Error)]
pub enum LocateError {
    /// Source directory cannot be listed.
    #[error("failed to read source directory {:?}", source_dir.display())]
    ReadSourceDir {
        #[source]
        source: std::io::Error,
        source_dir: PathBuf,
    },

    /// Artifact matcher cannot be compiled.
    #[error(transparent)]
    Pattern(#[from] regex::Error),

    /// No build of the trunk exists.
    #[error("no matching .amxd file found for file name trunk {trunk:?}")]
    NoMatch { trunk: String },
}

/// Friendly result alias :3
pub type Result<T, E = LocateError> = std::result::Result<T, E>;
