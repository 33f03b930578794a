//! CodeGenie configuration resolver
//!
//! Hierarchical configuration for CodeGenie: dotted keys resolved across
//! SESSION, PROJECT, TEAM, USER and GLOBAL scopes, with a read-through cache,
//! write validation, change watchers, backups and import/export.
//!
//! # Architecture
//!
//! ```text
//!                    ConfigManager
//!   ┌───────────┬──────────┼───────────┬──────────────┐
//!   ▼           ▼          ▼           ▼              ▼
//! ResolutionCache  ValidatorRegistry  WatcherRegistry  BackupManager
//!                          │
//!                   ConfigDocument (YAML/JSON per scope)
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use genie_config::prelude::*;
//! use serde_json::json;
//!
//! # fn example() -> ConfigResult<()> {
//! let manager = ConfigManager::open_default().with_team("platform");
//! manager.set("models.default", json!("codellama:7b"), ConfigScope::Team)?;
//!
//! let model = manager.get_or("models.default", "llama3.1:8b")?;
//! let backup = manager.backup(None)?;
//! manager.restore(&backup.name)?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

pub mod backup;
pub mod cache;
pub mod document;
pub mod error;
pub mod manager;
pub mod path;
pub mod paths;
pub mod records;
pub mod scope;
pub mod transfer;
pub mod validation;
pub mod watch;

pub use backup::{BackupInfo, BackupManager};
pub use cache::{CacheKey, CacheScope, CacheStats, ResolutionCache};
pub use document::{ConfigDocument, DocumentFormat};
pub use error::{ConfigError, ConfigResult, ErrorKind};
pub use manager::{ConfigManager, WriteOptions};
pub use path::ConfigPath;
pub use paths::{default_base_path, ConfigPaths};
pub use records::{
    CodeStyle, ExplanationDetail, PluginConfiguration, SkillLevel, TeamConfiguration,
    ThemeConfiguration, UserPreferences,
};
pub use scope::ConfigScope;
pub use transfer::ExportEnvelope;
pub use validation::{Validator, ValidatorRegistry};
pub use watch::{ConfigChange, WatchCallback, WatcherId};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with configuration
    pub use crate::error::{ConfigError, ConfigResult};
    pub use crate::manager::{ConfigManager, WriteOptions};
    pub use crate::records::{PluginConfiguration, TeamConfiguration, ThemeConfiguration, UserPreferences};
    pub use crate::scope::ConfigScope;
    pub use crate::watch::{ConfigChange, WatcherId};
}
