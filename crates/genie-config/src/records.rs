//! Typed whole-document records
//!
//! These records load and save an entire file as one value instead of going
//! through dotted-key get/set. [`TeamConfiguration`] shares its file with the
//! TEAM scope, so keys it does not model are carried through untouched.

use crate::document::{read_file, write_file};
use crate::error::{ConfigError, ConfigResult};
use crate::path::ConfigPath;
use crate::validation::ValidatorRegistry;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

/// Experience level used to tune explanations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkillLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
    Expert,
}

/// How much explanation accompanies generated code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationDetail {
    Brief,
    #[default]
    Normal,
    Detailed,
}

/// Formatting preferences for generated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeStyle {
    pub indent_size: u32,
    pub max_line_length: u32,
    pub quote_style: String,
    pub use_type_hints: bool,
}

impl Default for CodeStyle {
    fn default() -> Self {
        Self {
            indent_size: 4,
            max_line_length: 100,
            quote_style: "double".to_string(),
            use_type_hints: true,
        }
    }
}

/// Per-user preferences, stored in `user/preferences.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserPreferences {
    pub skill_level: SkillLevel,
    pub preferred_languages: Vec<String>,
    pub code_style: CodeStyle,
    /// How quickly suggestions adapt to feedback, in `[0, 1]`
    pub learning_rate: f64,
    pub explanation_detail: ExplanationDetail,
    pub auto_save: bool,
    pub theme: String,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            skill_level: SkillLevel::default(),
            preferred_languages: vec!["python".to_string()],
            code_style: CodeStyle::default(),
            learning_rate: 0.1,
            explanation_detail: ExplanationDetail::default(),
            auto_save: true,
            theme: "default".to_string(),
        }
    }
}

impl UserPreferences {
    /// Check fields against the default validators
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationFailed`] naming the first bad field.
    pub fn validate(&self) -> ConfigResult<()> {
        let registry = ValidatorRegistry::with_defaults();
        let value = serde_json::to_value(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(ConfigError::Serialize("preferences did not serialize to a mapping".into()));
        };

        for key in ["learning_rate", "skill_level", "code_style.indent_size"] {
            let path = ConfigPath::parse(key)?;
            if let Some(field) = path.lookup(&map) {
                if !registry.check(key, field) {
                    return Err(ConfigError::ValidationFailed {
                        key: key.to_string(),
                        value: field.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Shared team settings, stored in `teams/<team_id>.yaml`
///
/// The same file backs TEAM scope lookups; unmodelled keys land in `extra`
/// and are written back unchanged.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamConfiguration {
    pub team_id: String,
    pub name: String,
    pub members: Vec<String>,
    pub coding_standards: BTreeMap<String, String>,
    pub shared_settings: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TeamConfiguration {
    /// Empty configuration for a team
    #[must_use]
    pub fn new(team_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            team_id: team_id.into(),
            name: name.into(),
            ..Self::default()
        }
    }

    /// Build from a TEAM scope document, field by field
    ///
    /// Modelled fields that are null or absent take their defaults. Fields
    /// whose value does not fit their type also take their defaults, and
    /// their names are returned alongside the record. Every other key lands
    /// in `extra`.
    #[must_use]
    pub fn from_document(mut data: Map<String, Value>) -> (Self, Vec<String>) {
        let mut rejected = Vec::new();
        let team = Self {
            team_id: take_field(&mut data, "team_id", &mut rejected),
            name: take_field(&mut data, "name", &mut rejected),
            members: take_field(&mut data, "members", &mut rejected),
            coding_standards: take_field(&mut data, "coding_standards", &mut rejected),
            shared_settings: take_field(&mut data, "shared_settings", &mut rejected),
            extra: data,
        };
        (team, rejected)
    }
}

fn take_field<T: DeserializeOwned + Default>(
    data: &mut Map<String, Value>,
    field: &str,
    rejected: &mut Vec<String>,
) -> T {
    match data.remove(field) {
        None | Some(Value::Null) => T::default(),
        Some(value) => serde_json::from_value(value).unwrap_or_else(|_| {
            rejected.push(field.to_string());
            T::default()
        }),
    }
}

/// Plugin settings, stored in `plugins/<plugin_id>.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfiguration {
    pub plugin_id: String,
    pub enabled: bool,
    pub version: String,
    pub settings: Map<String, Value>,
}

impl Default for PluginConfiguration {
    fn default() -> Self {
        Self {
            plugin_id: String::new(),
            enabled: true,
            version: "0.1.0".to_string(),
            settings: Map::new(),
        }
    }
}

impl PluginConfiguration {
    /// Enabled plugin with no settings
    #[must_use]
    pub fn new(plugin_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            ..Self::default()
        }
    }
}

/// Color theme, stored in `themes/<name>.yaml`
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeConfiguration {
    pub name: String,
    pub colors: BTreeMap<String, String>,
    pub syntax: BTreeMap<String, String>,
}

/// Load a record; `Ok(None)` if the file is missing
pub(crate) fn load_record<T: DeserializeOwned>(path: &Path) -> ConfigResult<Option<T>> {
    read_file(path)
}

/// Load a team record, tolerating ill-typed modelled fields
///
/// Rejected fields are logged and read as defaults; saving the record
/// afterwards replaces them.
pub(crate) fn load_team(path: &Path) -> ConfigResult<Option<TeamConfiguration>> {
    let data = match read_file::<Value>(path)? {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Object(data)) => data,
        Some(_) => return Err(ConfigError::NotAMapping(path.to_path_buf())),
    };
    let (team, rejected) = TeamConfiguration::from_document(data);
    if !rejected.is_empty() {
        tracing::warn!(
            path = %path.display(),
            fields = ?rejected,
            "Team configuration fields have the wrong type, using defaults"
        );
    }
    Ok(Some(team))
}

/// Save a record, replacing the whole file
pub(crate) fn save_record<T: Serialize>(path: &Path, record: &T) -> ConfigResult<()> {
    write_file(path, record)?;
    tracing::debug!(path = %path.display(), "Saved config record");
    Ok(())
}

/// File stems of the `.yaml`/`.yml`/`.json` files in `dir`, sorted
pub(crate) fn list_stems(dir: &Path) -> ConfigResult<Vec<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(ConfigError::io_error(dir, e)),
    };

    let mut stems = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| ConfigError::io_error(dir, e))?.path();
        let supported = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| matches!(e, "yaml" | "yml" | "json"));
        if path.is_file() && supported {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                stems.push(stem.to_string());
            }
        }
    }
    stems.sort();
    stems.dedup();
    Ok(stems)
}
