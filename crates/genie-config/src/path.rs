//! Dotted configuration keys
//!
//! Provides [`ConfigPath`] for addressing values inside nested documents.
//! `"models.default"` addresses `{"models": {"default": ...}}`. Every
//! operation that walks a document (get, set, delete, validation lookups)
//! goes through the three traversal methods here.

use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Parsed dotted key
///
/// # Examples
/// - `["models", "default"]` → `models.default`
/// - `["code_style", "indent_size"]` → `code_style.indent_size`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConfigPath(Vec<String>);

impl ConfigPath {
    /// Parse a dotted key
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidKey`] for empty keys, empty segments or
    /// segments with characters other than alphanumerics, `_` and `-`.
    pub fn parse(key: &str) -> Result<Self, ConfigError> {
        key.parse()
    }

    /// Get path segments
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Get number of segments
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Never true for a parsed key
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Read the value at this path
    #[must_use]
    pub fn lookup<'a>(&self, root: &'a Map<String, Value>) -> Option<&'a Value> {
        let (last, parents) = self.0.split_last()?;
        let mut current = root;
        for segment in parents {
            current = current.get(segment)?.as_object()?;
        }
        current.get(last)
    }

    /// Write a value at this path, creating intermediate mappings
    ///
    /// An intermediate that exists but is not a mapping is replaced by one.
    pub fn assign(&self, root: &mut Map<String, Value>, value: Value) {
        let Some((last, parents)) = self.0.split_last() else {
            return;
        };
        let mut current = root;
        for segment in parents {
            let slot = current
                .entry(segment.clone())
                .or_insert_with(|| Value::Object(Map::new()));
            if !slot.is_object() {
                *slot = Value::Object(Map::new());
            }
            current = match slot {
                Value::Object(map) => map,
                _ => unreachable!("slot was just made a mapping"),
            };
        }
        current.insert(last.clone(), value);
    }

    /// Remove the leaf value at this path
    ///
    /// Returns the removed value, or `None` when any level is absent.
    /// Emptied parent mappings are left in place.
    pub fn remove(&self, root: &mut Map<String, Value>) -> Option<Value> {
        let (last, parents) = self.0.split_last()?;
        let mut current = root;
        for segment in parents {
            current = current.get_mut(segment)?.as_object_mut()?;
        }
        current.remove(last)
    }
}

impl Display for ConfigPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

impl FromStr for ConfigPath {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ConfigError::invalid_key(s, "key is empty"));
        }

        let segments: Vec<String> = s
            .split('.')
            .map(|seg| {
                if seg.is_empty() {
                    Err(ConfigError::invalid_key(s, "key contains an empty segment"))
                } else if seg.contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-') {
                    Err(ConfigError::invalid_key(
                        s,
                        format!("segment '{seg}' must be alphanumeric, '_' or '-'"),
                    ))
                } else {
                    Ok(seg.to_string())
                }
            })
            .collect::<Result<_, _>>()?;

        Ok(Self(segments))
    }
}
