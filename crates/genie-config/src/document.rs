//! File-backed configuration documents
//!
//! A [`ConfigDocument`] is a nested mapping stored as YAML or JSON. The
//! format follows the file extension. A missing file loads as an empty
//! document. An in-memory document has no file and saving it is a no-op.

use crate::error::{ConfigError, ConfigResult};
use crate::path::ConfigPath;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};

/// On-disk encoding of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
}

impl DocumentFormat {
    /// Detect format from file extension
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> ConfigResult<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Ok(Self::Yaml)
            }
            Some(ext) if ext.eq_ignore_ascii_case("json") => Ok(Self::Json),
            _ => Err(ConfigError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Parse text into a value
    pub(crate) fn parse<T: DeserializeOwned>(self, path: &Path, text: &str) -> ConfigResult<T> {
        match self {
            Self::Yaml => serde_yaml::from_str(text).map_err(|source| ConfigError::ParseYaml {
                path: path.to_path_buf(),
                source,
            }),
            Self::Json => serde_json::from_str(text).map_err(|source| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Render a value as text
    pub(crate) fn render<T: Serialize>(self, value: &T) -> ConfigResult<String> {
        match self {
            Self::Yaml => {
                serde_yaml::to_string(value).map_err(|e| ConfigError::Serialize(e.to_string()))
            }
            Self::Json => serde_json::to_string_pretty(value)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| ConfigError::Serialize(e.to_string())),
        }
    }
}

/// Read a whole file as a typed value
///
/// Returns `Ok(None)` when the file does not exist.
pub(crate) fn read_file<T: DeserializeOwned>(path: &Path) -> ConfigResult<Option<T>> {
    let format = DocumentFormat::from_path(path)?;
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(ConfigError::io_error(path, e)),
    };
    if text.trim().is_empty() {
        return Ok(None);
    }
    format.parse(path, &text).map(Some)
}

/// Write a typed value to a file, replacing it atomically
///
/// Parent directories are created as needed. The content goes to a
/// temporary sibling first and is renamed over the target. An existing
/// file keeps its permissions.
pub(crate) fn write_file<T: Serialize>(path: &Path, value: &T) -> ConfigResult<()> {
    let format = DocumentFormat::from_path(path)?;
    let text = format.render(value)?;

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| ConfigError::io_error(&parent, e))?;

    let mut tmp =
        tempfile::NamedTempFile::new_in(&parent).map_err(|e| ConfigError::io_error(&parent, e))?;
    tmp.write_all(text.as_bytes())
        .map_err(|e| ConfigError::io_error(tmp.path(), e))?;
    match std::fs::metadata(path) {
        Ok(existing) => tmp
            .as_file()
            .set_permissions(existing.permissions())
            .map_err(|e| ConfigError::io_error(tmp.path(), e))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ConfigError::io_error(path, e)),
    }
    tmp.persist(path)
        .map_err(|e| ConfigError::io_error(path, e.error))?;
    Ok(())
}

/// Nested key/value document, bound to a file or held in memory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConfigDocument {
    path: Option<PathBuf>,
    data: Map<String, Value>,
}

impl ConfigDocument {
    /// Empty document that will be written to `path`
    #[inline]
    #[must_use]
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            data: Map::new(),
        }
    }

    /// Empty document with no backing file
    #[inline]
    #[must_use]
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Load a document; a missing or blank file is an empty document
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, cannot be parsed, or its
    /// top level is not a mapping.
    pub fn load(path: impl Into<PathBuf>) -> ConfigResult<Self> {
        let path = path.into();
        let data = match read_file::<Value>(&path)? {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map,
            Some(_) => return Err(ConfigError::NotAMapping(path)),
        };
        tracing::debug!(path = %path.display(), keys = data.len(), "Loaded config document");
        Ok(Self {
            path: Some(path),
            data,
        })
    }

    /// Persist the document to its file; in-memory documents are left as is
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails.
    pub fn save(&self) -> ConfigResult<()> {
        match &self.path {
            Some(path) => write_file(path, &self.data),
            None => Ok(()),
        }
    }

    /// File backing this document
    #[inline]
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whole mapping
    #[inline]
    #[must_use]
    pub fn data(&self) -> &Map<String, Value> {
        &self.data
    }

    /// Whether the document holds no keys
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at a dotted key
    #[inline]
    #[must_use]
    pub fn get(&self, key: &ConfigPath) -> Option<&Value> {
        key.lookup(&self.data)
    }

    /// Set a value at a dotted key
    #[inline]
    pub fn set(&mut self, key: &ConfigPath, value: Value) {
        key.assign(&mut self.data, value);
    }

    /// Remove a value at a dotted key
    #[inline]
    pub fn remove(&mut self, key: &ConfigPath) -> Option<Value> {
        key.remove(&mut self.data)
    }

    /// Shallow merge: top-level keys of `other` overwrite ours
    ///
    /// Nested mappings are replaced wholesale, never deep-merged.
    pub fn merge_top_level(&mut self, other: Map<String, Value>) {
        self.data.extend(other);
    }

    /// Replace the whole mapping
    #[inline]
    pub fn replace(&mut self, data: Map<String, Value>) {
        self.data = data;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn key(s: &str) -> ConfigPath {
        ConfigPath::parse(s).unwrap()
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/config.yaml")).unwrap(),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("a/config.YML")).unwrap(),
            DocumentFormat::Yaml
        );
        assert_eq!(
            DocumentFormat::from_path(Path::new("export.json")).unwrap(),
            DocumentFormat::Json
        );
        assert!(matches!(
            DocumentFormat::from_path(Path::new("config.toml")),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn missing_file_is_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let doc = ConfigDocument::load(dir.path().join("global/config.yaml")).unwrap();
        assert!(doc.is_empty());
    }

    #[test]
    fn blank_file_is_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "\n  \n").unwrap();
        assert!(ConfigDocument::load(&path).unwrap().is_empty());
    }

    #[test]
    fn yaml_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user/config.yaml");

        let mut doc = ConfigDocument::empty(&path);
        doc.set(&key("models.default"), json!("codellama:7b"));
        doc.set(&key("ui.theme"), json!("dark"));
        doc.save().unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("default: codellama:7b"));

        let reloaded = ConfigDocument::load(&path).unwrap();
        assert_eq!(reloaded.get(&key("models.default")), Some(&json!("codellama:7b")));
        assert_eq!(reloaded.data(), doc.data());
    }

    #[test]
    fn json_document_detected_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"models": {"default": "mistral"}}"#).unwrap();

        let doc = ConfigDocument::load(&path).unwrap();
        assert_eq!(doc.get(&key("models.default")), Some(&json!("mistral")));
    }

    #[test]
    fn non_mapping_top_level_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "- a\n- b\n").unwrap();
        assert!(matches!(
            ConfigDocument::load(&path),
            Err(ConfigError::NotAMapping(_))
        ));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "models: [unclosed\n").unwrap();
        assert!(matches!(
            ConfigDocument::load(&path),
            Err(ConfigError::ParseYaml { .. })
        ));
    }

    #[test]
    fn in_memory_save_writes_nothing() {
        let mut doc = ConfigDocument::in_memory();
        doc.set(&key("draft"), json!("wip"));
        doc.save().unwrap();
        assert_eq!(doc.path(), None);
        assert_eq!(doc.get(&key("draft")), Some(&json!("wip")));
    }

    #[cfg(unix)]
    #[test]
    fn rewrite_keeps_existing_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("teams/core.yaml");
        let mut doc = ConfigDocument::empty(&path);
        doc.set(&key("name"), json!("Core"));
        doc.save().unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o644)).unwrap();

        doc.set(&key("members"), json!(["ada"]));
        doc.save().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[test]
    fn merge_top_level_is_shallow() {
        let mut doc = ConfigDocument::empty("x.yaml");
        doc.replace(
            json!({"b": 99, "c": 3, "nested": {"keep": 1, "over": 1}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        doc.merge_top_level(
            json!({"a": 1, "b": 2, "nested": {"over": 2}})
                .as_object()
                .cloned()
                .unwrap(),
        );
        assert_eq!(
            Value::Object(doc.data().clone()),
            json!({"a": 1, "b": 2, "c": 3, "nested": {"over": 2}})
        );
    }
}
