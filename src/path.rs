// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Path resolution utilities.
//!
//! Determine where the configuration file and the style cleanup scratch
//! directory live when the user does not say otherwise.

use std::{env, path::PathBuf};

/// Environment variable that overrides the configuration file location.
pub const CONFIG_ENV: &str = "M4LKIT_CONFIG";

/// Determine absolute path to the configuration file.
///
/// Uses `$M4LKIT_CONFIG` when it is set. Otherwise falls back to the XDG
/// configuration directory, i.e., `$XDG_CONFIG_HOME/m4lkit/config.toml`. Does
/// not check if the path returned actually exists.
///
/// # Errors
///
/// - Return [`NoConfigDir`] if the configuration directory cannot be
///   determined.
///
/// # See Also
///
/// - [XDG Base Directory](https://wiki.archlinux.org/title/XDG_Base_Directory)
pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV) {
        return Ok(PathBuf::from(path));
    }

    dirs::config_dir()
        .map(|path| path.join("m4lkit").join("config.toml"))
        .ok_or(NoConfigDir)
}

/// Determine default scratch directory for non in-place style cleanup.
///
/// Lives under the system temporary directory. Does not create it.
pub fn default_scratch_dir() -> PathBuf {
    env::temp_dir().join("max-styles-cleanup")
}

/// No way to determine user's configuration directory.
///
/// # See Also
///
/// - [`dirs::config_dir`](https://docs.rs/dirs/latest/dirs/fn.config_dir.html)
#[derive(Clone, Debug, thiserror::Error)]
#[error("cannot determine absolute path to user's configuration directory")]
pub struct NoConfigDir;

/// Friendly result alias :3
pub type Result<T, E = NoConfigDir> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sealed_test::prelude::*;

    #[sealed_test(env = [("M4LKIT_CONFIG", "/etc/m4lkit/custom.toml")])]
    fn config_path_from_environment() -> anyhow::Result<()> {
        assert_eq!(
            default_config_path()?,
            PathBuf::from("/etc/m4lkit/custom.toml")
        );

        Ok(())
    }

    #[test]
    fn scratch_dir_under_temp_dir() {
        let result = default_scratch_dir();
        assert!(result.starts_with(env::temp_dir()));
        assert!(result.ends_with("max-styles-cleanup"));
    }
}
