//! Error types for configuration resolution
//!
//! Provides error handling for:
//! - Argument errors (scope tags, discriminators, dotted keys, names)
//! - Validation rejections on write
//! - Missing backups and malformed import envelopes
//! - Document I/O and parsing

use crate::scope::ConfigScope;
use serde_json::Value;
use std::path::PathBuf;

/// Coarse error taxonomy shared by every [`ConfigError`] variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad scope, key, name or discriminator; nothing was written
    InvalidArgument,
    /// A registered validator rejected the value; nothing was written
    InvalidValue,
    /// Backup or envelope content missing; live state untouched
    NotFound,
    /// Filesystem or format failure while loading or saving
    Io,
}

/// Main configuration error type
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Project and team scopes need a project path or team id
    #[error("scope '{scope}' requires a discriminator")]
    MissingDiscriminator { scope: ConfigScope },

    /// Scope tag did not match any known scope
    #[error("unknown configuration scope: '{0}'")]
    UnknownScope(String),

    /// Dotted key could not be parsed
    #[error("invalid configuration key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    /// Backup name, team id, plugin id or theme name unusable as a file name
    #[error("invalid {kind} name: '{name}'")]
    InvalidName { kind: &'static str, name: String },

    /// File extension is neither YAML nor JSON
    #[error("unsupported document format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Backup names are never reused
    #[error("backup already exists: '{0}'")]
    BackupExists(String),

    /// Validator rejected a value
    #[error("invalid value for '{key}': {value}")]
    ValidationFailed { key: String, value: Value },

    /// Restore target does not exist
    #[error("backup not found: '{0}'")]
    BackupNotFound(String),

    /// Import file lacks a usable `configuration` section
    #[error("malformed export envelope {}: {reason}", .path.display())]
    MalformedEnvelope { path: PathBuf, reason: String },

    /// Filesystem error
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML document could not be parsed
    #[error("failed to parse YAML {}: {source}", .path.display())]
    ParseYaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// JSON document could not be parsed
    #[error("failed to parse JSON {}: {source}", .path.display())]
    ParseJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Document top level is a scalar or sequence
    #[error("document is not a mapping: {}", .0.display())]
    NotAMapping(PathBuf),

    /// Serialization of a document or record failed
    #[error("serialization failed: {0}")]
    Serialize(String),

    /// A directory swap failed during restore; earlier swaps were rolled back
    #[error("restore of '{directory}' failed: {source}")]
    Restore {
        directory: String,
        #[source]
        source: Box<ConfigError>,
    },
}

impl ConfigError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create invalid key error
    pub fn invalid_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create invalid name error
    pub fn invalid_name(kind: &'static str, name: impl Into<String>) -> Self {
        Self::InvalidName {
            kind,
            name: name.into(),
        }
    }

    /// Create malformed envelope error
    pub fn malformed_envelope(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedEnvelope {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Which part of the taxonomy this error belongs to
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingDiscriminator { .. }
            | Self::UnknownScope(_)
            | Self::InvalidKey { .. }
            | Self::InvalidName { .. }
            | Self::UnsupportedFormat(_)
            | Self::BackupExists(_) => ErrorKind::InvalidArgument,
            Self::ValidationFailed { .. } => ErrorKind::InvalidValue,
            Self::BackupNotFound(_) | Self::MalformedEnvelope { .. } => ErrorKind::NotFound,
            Self::Io { .. }
            | Self::ParseYaml { .. }
            | Self::ParseJson { .. }
            | Self::NotAMapping(_)
            | Self::Serialize(_) => ErrorKind::Io,
            Self::Restore { source, .. } => source.kind(),
        }
    }
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
