//! Export envelopes
//!
//! An export wraps one scope's document:
//!
//! ```yaml
//! scope: user
//! exported_at: 2026-10-19T08:30:00Z
//! version: 0.1.0
//! configuration:
//!   models:
//!     default: codellama:7b
//! ```

use crate::document::read_file;
use crate::error::{ConfigError, ConfigResult};
use crate::scope::ConfigScope;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

/// Serialized form of an exported scope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEnvelope {
    /// Scope the document was exported from
    pub scope: ConfigScope,
    /// Export time
    pub exported_at: DateTime<Utc>,
    /// Crate version that wrote the export
    pub version: String,
    /// The document itself
    pub configuration: Map<String, Value>,
}

impl ExportEnvelope {
    /// Wrap a document exported now
    #[must_use]
    pub fn new(scope: ConfigScope, configuration: Map<String, Value>) -> Self {
        Self {
            scope,
            exported_at: Utc::now(),
            version: crate::VERSION.to_string(),
            configuration,
        }
    }
}

/// Read the `configuration` section of an export file
///
/// Only `configuration` is required; the other envelope fields are
/// informational and may be absent.
///
/// # Errors
/// - [`ConfigError::Io`] if the file is missing or unreadable
/// - [`ConfigError::MalformedEnvelope`] if the file is empty, or `configuration`
///   is missing or not a mapping
pub fn read_configuration(path: &Path) -> ConfigResult<Map<String, Value>> {
    let Some(raw) = read_file::<Value>(path)? else {
        if path.exists() {
            return Err(ConfigError::malformed_envelope(path, "file is empty"));
        }
        return Err(ConfigError::io_error(
            path,
            std::io::Error::new(std::io::ErrorKind::NotFound, "export file does not exist"),
        ));
    };

    let Value::Object(mut envelope) = raw else {
        return Err(ConfigError::malformed_envelope(path, "top level is not a mapping"));
    };
    match envelope.remove("configuration") {
        Some(Value::Object(configuration)) => Ok(configuration),
        Some(Value::Null) | None => Err(ConfigError::malformed_envelope(
            path,
            "missing 'configuration' section",
        )),
        Some(_) => Err(ConfigError::malformed_envelope(
            path,
            "'configuration' is not a mapping",
        )),
    }
}
