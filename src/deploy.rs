// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Device deployment logic.
//!
//! Max for Live devices get built into a source directory as individually
//! versioned files, e.g., `ClipTargeter-1.4.2.amxd`. Live sets refer to devices
//! by file name, so a deployment copies one of those builds under a stable
//! name into one of two deploy directories.
//!
//! # Deploy Targets
//!
//! The __production__ directory sits in Live's search path. Deployments there
//! use the bare trunk name, `<trunk>.amxd`, and ask before replacing an
//! existing device.
//!
//! The __development__ directory sits outside Live's search path. Deployments
//! there use `<trunk><suffix>.amxd` and always replace silently, because the
//! whole point is to iterate quickly on a throwaway copy.
//!
//! # See Also
//!
//! 1. [`locate`]
//! 2. [`history`]

pub mod history;
pub mod locate;
pub mod tags;

use crate::{
    config::DeploySettings,
    deploy::{history::HistoryRecord, tags::TagCleaner},
};

use inquire::{InquireError, Text};
use std::{
    fmt::{Display, Formatter, Result as FmtResult},
    fs::copy,
    path::{Path, PathBuf},
};
use tracing::{debug, info, instrument};

/// Where a device gets deployed to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum DeployTarget {
    #[default]
    Production,

    Development,
}

impl DeployTarget {
    /// Label written into the history log.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Production => "[PROD]",
            Self::Development => "[DEV]",
        }
    }
}

impl Display for DeployTarget {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Production => fmt.write_str("production"),
            Self::Development => fmt.write_str("development"),
        }
    }
}

/// Deploy directories and naming policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployLayout {
    pub production_dir: PathBuf,
    pub development_dir: PathBuf,
    pub development_suffix: String,
}

impl DeployLayout {
    /// Compute destination path of a trunk for target.
    pub fn destination(&self, target: DeployTarget, trunk: &str) -> PathBuf {
        match target {
            DeployTarget::Production => self.production_dir.join(format!("{trunk}.amxd")),
            DeployTarget::Development => self
                .development_dir
                .join(format!("{trunk}{}.amxd", self.development_suffix)),
        }
    }
}

impl From<&DeploySettings> for DeployLayout {
    fn from(settings: &DeploySettings) -> Self {
        Self {
            production_dir: settings.production_dir.as_path().to_path_buf(),
            development_dir: settings.development_dir.as_path().to_path_buf(),
            development_suffix: settings.development_suffix.clone(),
        }
    }
}

/// Verify every directory the deploy tool depends on exists.
///
/// # Errors
///
/// - Return [`DeployError::MissingDirectory`] for the first missing one.
pub fn require_directories(settings: &DeploySettings) -> Result<()> {
    for dir in [
        &settings.source_dir,
        &settings.production_dir,
        &settings.development_dir,
    ] {
        if !dir.as_path().is_dir() {
            return Err(DeployError::MissingDirectory {
                path: dir.as_path().to_path_buf(),
            });
        }
    }

    Ok(())
}

/// Ask the user whether an existing device may be replaced.
pub trait OverwritePrompt {
    /// Return `true` only if the user confirmed replacing `destination`.
    fn confirm(&self, destination: &Path) -> Result<bool>;
}

/// Interactive prompt on the terminal.
///
/// Only `y` or `Y` counts as confirmation. Cancelling the prompt counts as a
/// refusal.
#[derive(Debug, Default, Clone)]
pub struct InquirePrompt;

impl OverwritePrompt for InquirePrompt {
    fn confirm(&self, destination: &Path) -> Result<bool> {
        println!(
            "Device already exists at [production] path:\n\t{}",
            destination.display()
        );
        match Text::new("Replace existing device? (y/n):").prompt() {
            Ok(answer) => Ok(is_affirmative(&answer)),
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(false),
            Err(error) => Err(DeployError::Prompt(error)),
        }
    }
}

/// Check answer to overwrite prompt.
pub fn is_affirmative(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

/// One requested deployment.
#[derive(Debug, Clone)]
pub struct DeployRequest {
    pub source: PathBuf,
    pub trunk: String,
    pub target: DeployTarget,
    pub assume_yes: bool,
}

/// Result of a deployment attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// File copied. Record belongs in the history log.
    Deployed(HistoryRecord),

    /// User refused to replace existing device. Nothing was touched.
    Declined { destination: PathBuf },
}

/// Copy builds into deploy directories.
#[derive(Debug)]
pub struct Deployer<P = InquirePrompt>
where
    P: OverwritePrompt,
{
    layout: DeployLayout,
    prompt: P,
    tag_cleaner: Option<TagCleaner>,
}

impl<P> Deployer<P>
where
    P: OverwritePrompt,
{
    /// Construct new deployer.
    pub fn new(layout: DeployLayout, prompt: P) -> Self {
        Self {
            layout,
            prompt,
            tag_cleaner: None,
        }
    }

    /// Run tag cleanup after each successful copy.
    pub fn with_tag_cleaner(mut self, tag_cleaner: TagCleaner) -> Self {
        self.tag_cleaner = Some(tag_cleaner);
        self
    }

    /// Deploy directory layout.
    pub fn layout(&self) -> &DeployLayout {
        &self.layout
    }

    /// Deploy a build.
    ///
    /// Replacing an existing production device requires confirmation unless
    /// the request says to assume yes. Development devices are always
    /// replaced without asking.
    ///
    /// # Errors
    ///
    /// - Return [`DeployError::Prompt`] if the prompt itself fails.
    /// - Return [`DeployError::CopyBuild`] if the copy fails, e.g., the source is
    ///   missing or the destination is not writable.
    #[instrument(skip(self, request), level = "debug")]
    pub fn deploy(&self, request: &DeployRequest) -> Result<DeployOutcome> {
        let destination = self.layout.destination(request.target, &request.trunk);
        info!("deploy {:?} to {}", request.source.display(), request.target);

        // INVARIANT: Only production replacements ever ask.
        if destination.exists()
            && request.target == DeployTarget::Production
            && !request.assume_yes
            && !self.prompt.confirm(&destination)?
        {
            return Ok(DeployOutcome::Declined { destination });
        }

        let record = HistoryRecord::now(request.target, &request.source, &destination);
        println!("\n{record}\n");

        let bytes = copy(&request.source, &destination).map_err(|err| DeployError::CopyBuild {
            source: err,
            from: request.source.clone(),
            to: destination.clone(),
        })?;
        debug!("copied {bytes} bytes");

        if let Some(tag_cleaner) = &self.tag_cleaner {
            let cleared = tag_cleaner.run();
            debug!("cleared tags on {cleared} project files");
        }

        Ok(DeployOutcome::Deployed(record))
    }
}

/// Deployment error types.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    /// Required directory is missing.
    #[error("Required directory does not exist.\n{}", path.display())]
    MissingDirectory { path: PathBuf },

    /// Overwrite prompt fails.
    #[error(transparent)]
    Prompt(#[from] InquireError),

    /// Build cannot be copied into place.
    #[error("failed to copy {:?} to {:?}", from.display(), to.display())]
    CopyBuild {
        #[source]
        source: std::io::Error,
        from: PathBuf,
        to: PathBuf,
    },
}

/// Friendly result alias :3
pub type Result<T, E = DeployError> = std::result::Result<T, E>;
