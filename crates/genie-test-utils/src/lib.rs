//! Testing utilities for the CodeGenie configuration workspace
//!
//! Shared fixtures and helpers.

#![allow(missing_docs)]

use genie_config::{
    ConfigManager, ConfigScope, PluginConfiguration, TeamConfiguration, ThemeConfiguration,
};
use serde_json::{json, Map, Value};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Temporary base directory with a manager rooted in it
///
/// The directory is removed when the fixture drops.
pub struct TempConfigRoot {
    dir: TempDir,
    pub manager: ConfigManager,
}

impl TempConfigRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().join("codegenie"));
        Self { dir, manager }
    }

    /// Fixture whose manager has a current team and project
    pub fn with_context(team_id: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let project = dir.path().join("project");
        std::fs::create_dir_all(&project).unwrap();
        let manager = ConfigManager::new(dir.path().join("codegenie"))
            .with_team(team_id)
            .with_project(project);
        Self { dir, manager }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn base(&self) -> &Path {
        self.manager.base_path()
    }

    pub fn project(&self) -> PathBuf {
        self.dir.path().join("project")
    }

    /// Path for a scratch file next to the base directory
    pub fn scratch(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

impl Default for TempConfigRoot {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a fmt subscriber honoring `RUST_LOG`; repeated calls are no-ops
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Global and user defaults used across tests
pub fn seed_defaults(manager: &ConfigManager) {
    manager
        .set("models.default", "llama3.1:8b", ConfigScope::Global)
        .unwrap();
    manager.set("ui.theme", "light", ConfigScope::Global).unwrap();
    manager.set("learning_rate", 0.1, ConfigScope::User).unwrap();
}

pub fn sample_mapping() -> Map<String, Value> {
    json!({
        "models": {"default": "mistral:7b", "temperature": 0.2},
        "editor": "helix"
    })
    .as_object()
    .cloned()
    .unwrap()
}

pub fn sample_team(team_id: &str) -> TeamConfiguration {
    let mut team = TeamConfiguration::new(team_id, format!("Team {team_id}"));
    team.members = vec!["ada".to_string(), "linus".to_string()];
    team.coding_standards
        .insert("rust".to_string(), "rustfmt defaults".to_string());
    team
}

pub fn sample_plugin(plugin_id: &str) -> PluginConfiguration {
    let mut plugin = PluginConfiguration::new(plugin_id);
    plugin.settings.insert("strict".to_string(), json!(true));
    plugin
}

pub fn sample_theme(name: &str) -> ThemeConfiguration {
    let mut theme = ThemeConfiguration {
        name: name.to_string(),
        ..ThemeConfiguration::default()
    };
    theme
        .colors
        .insert("background".to_string(), "#1e1e1e".to_string());
    theme
        .syntax
        .insert("keyword".to_string(), "#569cd6".to_string());
    theme
}
