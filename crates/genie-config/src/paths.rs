//! On-disk layout
//!
//! ```text
//! <base>/                          # default ~/.codegenie
//! ├── global/config.yaml           # GLOBAL scope
//! ├── user/config.yaml             # USER scope
//! ├── user/preferences.yaml        # UserPreferences record
//! ├── teams/<team_id>.yaml         # TEAM scope / TeamConfiguration
//! ├── plugins/<plugin_id>.yaml     # PluginConfiguration
//! ├── themes/<theme_name>.yaml     # ThemeConfiguration
//! └── backups/<name>/...           # snapshots
//!
//! <project>/.codegenie/config.yaml # PROJECT scope
//! ```

use crate::backup::validate_name;
use crate::error::ConfigResult;
use std::path::{Path, PathBuf};

/// Base directory name under the home directory
pub const DEFAULT_DIR_NAME: &str = ".codegenie";

/// Project config directory name.
pub const PROJECT_CONFIG_DIR: &str = ".codegenie";

/// Config file name used by global, user and project scopes.
pub const CONFIG_FILE: &str = "config.yaml";

/// Default base path: `~/.codegenie`, or `./.codegenie` without a home dir
#[must_use]
pub fn default_base_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DEFAULT_DIR_NAME)
}

/// File locations under one base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigPaths {
    base: PathBuf,
}

impl ConfigPaths {
    /// Layout rooted at `base`
    #[inline]
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self { base: base.into() }
    }

    /// Base directory
    #[inline]
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// `<base>/global/config.yaml`
    #[must_use]
    pub fn global_config(&self) -> PathBuf {
        self.base.join("global").join(CONFIG_FILE)
    }

    /// `<base>/user/config.yaml`
    #[must_use]
    pub fn user_config(&self) -> PathBuf {
        self.base.join("user").join(CONFIG_FILE)
    }

    /// `<base>/user/preferences.yaml`
    #[must_use]
    pub fn user_preferences(&self) -> PathBuf {
        self.base.join("user").join("preferences.yaml")
    }

    /// `<base>/teams`
    #[must_use]
    pub fn teams_dir(&self) -> PathBuf {
        self.base.join("teams")
    }

    /// `<base>/teams/<team_id>.yaml`
    ///
    /// # Errors
    /// Returns an error if `team_id` is not a plain file name.
    pub fn team_config(&self, team_id: &str) -> ConfigResult<PathBuf> {
        validate_name("team", team_id)?;
        Ok(self.teams_dir().join(format!("{team_id}.yaml")))
    }

    /// `<base>/plugins`
    #[must_use]
    pub fn plugins_dir(&self) -> PathBuf {
        self.base.join("plugins")
    }

    /// `<base>/plugins/<plugin_id>.yaml`
    ///
    /// # Errors
    /// Returns an error if `plugin_id` is not a plain file name.
    pub fn plugin_config(&self, plugin_id: &str) -> ConfigResult<PathBuf> {
        validate_name("plugin", plugin_id)?;
        Ok(self.plugins_dir().join(format!("{plugin_id}.yaml")))
    }

    /// `<base>/themes`
    #[must_use]
    pub fn themes_dir(&self) -> PathBuf {
        self.base.join("themes")
    }

    /// `<base>/themes/<theme_name>.yaml`
    ///
    /// # Errors
    /// Returns an error if `theme_name` is not a plain file name.
    pub fn theme_config(&self, theme_name: &str) -> ConfigResult<PathBuf> {
        validate_name("theme", theme_name)?;
        Ok(self.themes_dir().join(format!("{theme_name}.yaml")))
    }

    /// `<project>/.codegenie/config.yaml`; independent of the base path
    #[must_use]
    pub fn project_config(project: &Path) -> PathBuf {
        project.join(PROJECT_CONFIG_DIR).join(CONFIG_FILE)
    }
}
