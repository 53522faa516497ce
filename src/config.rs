// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Both tools share one TOML configuration file. The deploy tool reads the
//! `[deploy]` table to know where build artifacts live and where they get
//! deployed to. The style cleanup tool reads the `[styles]` table to know
//! where to put its scratch output.
//!
//! Every field is optional. Missing fields fall back to the layout of the
//! author's machine, which is what the tools were written against. All path
//! fields go through shell expansion, so `~` and `$VAR` work as expected.

use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::{debug, instrument};

/// Top-level configuration layout.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Settings for the deploy tool.
    pub deploy: DeploySettings,

    /// Settings for the style cleanup tool.
    pub styles: StyleSettings,
}

impl ToolConfig {
    /// Load configuration file at target path.
    ///
    /// A missing file is not an error. The built-in defaults are used instead.
    ///
    /// # Errors
    ///
    /// - Return [`ConfigError::Read`] if the file exists but cannot be read.
    /// - Return [`ConfigError::Deserialize`] if the file is not valid TOML.
    /// - Return [`ConfigError::ShellExpansion`] if a path references an
    ///   undefined variable.
    #[instrument(skip(path), level = "debug")]
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("no configuration at {:?}, using defaults", path.display());
            return Self::default().expand();
        }

        debug!("load configuration from {:?}", path.display());
        read_to_string(path)
            .map_err(|err| ConfigError::Read {
                source: err,
                path: path.to_path_buf(),
            })?
            .parse()
    }

    fn expand(mut self) -> Result<Self> {
        let deploy = &mut self.deploy;
        deploy.source_dir = deploy.source_dir.expand()?;
        deploy.production_dir = deploy.production_dir.expand()?;
        deploy.development_dir = deploy.development_dir.expand()?;
        deploy.history_file = deploy.history_file.expand()?;
        deploy.tag_cleanup.root = deploy.tag_cleanup.root.expand()?;
        self.styles.scratch_dir = self
            .styles
            .scratch_dir
            .map(|path| path.expand())
            .transpose()?;

        Ok(self)
    }
}

impl FromStr for ToolConfig {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let config: ToolConfig = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Perform shell expansion on every path field.
        config.expand()
    }
}

impl Display for ToolConfig {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

/// Deploy tool settings.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DeploySettings {
    /// Directory holding individually versioned build artifacts.
    pub source_dir: ConfigPath,

    /// Deploy directory inside Live's search path.
    pub production_dir: ConfigPath,

    /// Deploy directory outside Live's search path.
    pub development_dir: ConfigPath,

    /// Filename suffix appended to development deployments.
    pub development_suffix: String,

    /// Append-only deployment history log.
    pub history_file: ConfigPath,

    /// Number of history lines shown by default.
    pub history_lines: usize,

    /// Post-deploy tag metadata cleanup.
    pub tag_cleanup: TagCleanupSettings,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            source_dir: ConfigPath::new("~/build/m4l_amxd"),
            production_dir: ConfigPath::new("~/Music/Ableton/User Library/M4L Toolkit v1"),
            development_dir: ConfigPath::new("~/build/m4l_DEVELOPMENT"),
            development_suffix: "-DEV".into(),
            history_file: ConfigPath::new(
                "~/Music/Ableton/User Library/m4l_deploy_amxd_history.log",
            ),
            history_lines: 100,
            tag_cleanup: TagCleanupSettings::default(),
        }
    }
}

/// Which project marker files lose which extended attribute after a deploy.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TagCleanupSettings {
    /// Directory tree to search.
    pub root: ConfigPath,

    /// Glob pattern relative to root.
    pub pattern: String,

    /// Extended attribute name to delete.
    pub attribute: String,
}

impl Default for TagCleanupSettings {
    fn default() -> Self {
        Self {
            root: ConfigPath::new("~/Max for Live Device Projects/Max for Live Devices"),
            pattern: "**/*.maxproj".into(),
            attribute: "com.apple.metadata:_kMDItemUserTags".into(),
        }
    }
}

/// Style cleanup tool settings.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StyleSettings {
    /// Directory for non in-place output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scratch_dir: Option<ConfigPath>,
}

/// Path value from the configuration file.
#[derive(Default, Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
pub struct ConfigPath(PathBuf);

impl ConfigPath {
    /// Construct new configuration path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    /// Treat configuration path as [`Path`] slice.
    pub fn as_path(&self) -> &Path {
        self.0.as_path()
    }

    fn expand(&self) -> Result<Self> {
        let expanded = shellexpand::full(self.to_string().as_str())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();

        Ok(Self::new(expanded))
    }
}

impl AsRef<Path> for ConfigPath {
    fn as_ref(&self) -> &Path {
        self.as_path()
    }
}

impl Display for ConfigPath {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(self.as_path().to_string_lossy().as_ref())
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read configuration at {:?}", path.display())]
    Read {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("BLAH", "/home/blah")])]
    fn deserialize_tool_config() -> anyhow::Result<()> {
        let result: ToolConfig = r#"
            [deploy]
            source_dir = "$BLAH/build"
            production_dir = "$BLAH/prod"
            development_dir = "$BLAH/dev"
            development_suffix = "-TEST"
            history_file = "$BLAH/history.log"
            history_lines = 20

            [deploy.tag_cleanup]
            root = "$BLAH/projects"
            pattern = "*.maxproj"
            attribute = "user.tags"

            [styles]
            scratch_dir = "$BLAH/scratch"
        "#
        .parse()?;

        let expect = ToolConfig {
            deploy: DeploySettings {
                source_dir: ConfigPath::new("/home/blah/build"),
                production_dir: ConfigPath::new("/home/blah/prod"),
                development_dir: ConfigPath::new("/home/blah/dev"),
                development_suffix: "-TEST".into(),
                history_file: ConfigPath::new("/home/blah/history.log"),
                history_lines: 20,
                tag_cleanup: TagCleanupSettings {
                    root: ConfigPath::new("/home/blah/projects"),
                    pattern: "*.maxproj".into(),
                    attribute: "user.tags".into(),
                },
            },
            styles: StyleSettings {
                scratch_dir: Some(ConfigPath::new("/home/blah/scratch")),
            },
        };

        assert_eq!(result, expect);

        Ok(())
    }

    #[sealed_test(env = [("HOME", "/home/blah")])]
    fn partial_config_uses_defaults() -> anyhow::Result<()> {
        let result: ToolConfig = r#"
            [deploy]
            development_suffix = "-WIP"
        "#
        .parse()?;

        assert_eq!(result.deploy.development_suffix, "-WIP");
        assert_eq!(result.deploy.history_lines, 100);
        assert_eq!(
            result.deploy.source_dir,
            ConfigPath::new("/home/blah/build/m4l_amxd")
        );
        assert_eq!(result.deploy.tag_cleanup.pattern, "**/*.maxproj");
        assert_eq!(result.styles.scratch_dir, None);

        Ok(())
    }

    #[test]
    fn undefined_variable_is_rejected() {
        let result = r#"
            [deploy]
            source_dir = "$M4LKIT_SURELY_UNDEFINED_VARIABLE/build"
        "#
        .parse::<ToolConfig>();

        assert!(matches!(result, Err(ConfigError::ShellExpansion(_))));
    }

    #[test]
    fn serialize_tool_config() -> anyhow::Result<()> {
        let mut config = ToolConfig::default();
        config.deploy.source_dir = ConfigPath::new("/build");
        config.deploy.production_dir = ConfigPath::new("/prod");
        config.deploy.development_dir = ConfigPath::new("/dev");
        config.deploy.history_file = ConfigPath::new("/history.log");
        config.deploy.tag_cleanup.root = ConfigPath::new("/projects");
        let result = config.to_string();

        let expect = indoc! {r#"
            [deploy]
            source_dir = "/build"
            production_dir = "/prod"
            development_dir = "/dev"
            development_suffix = "-DEV"
            history_file = "/history.log"
            history_lines = 100
        "#};
        assert!(result.starts_with(expect), "unexpected layout:\n{result}");
        assert!(result.contains("[deploy.tag_cleanup]"));
        assert_eq!(result.parse::<ToolConfig>()?, config);

        Ok(())
    }
}
