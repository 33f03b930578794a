//! Scoped configuration resolution
//!
//! [`ConfigManager`] resolves dotted keys across the scope hierarchy, caches
//! the results, validates writes, notifies watchers, and owns backups and
//! import/export for one base path.
//!
//! # Resolution
//!
//! ```text
//! get("models.default")
//!        │
//!        ▼
//!  ResolutionCache ──hit──▶ value
//!        │ miss
//!        ▼
//!  SESSION → PROJECT → TEAM → USER → GLOBAL   (first non-null wins)
//!        │
//!        ▼
//!  cache insert ──▶ value (or default)
//! ```
//!
//! PROJECT and TEAM take part in the walk only when the manager has a
//! current project path or team id.
//!
//! # Example
//!
//! ```rust,no_run
//! use genie_config::{ConfigManager, ConfigScope};
//! use serde_json::json;
//!
//! # fn example() -> genie_config::ConfigResult<()> {
//! let manager = ConfigManager::new("/tmp/codegenie");
//! manager.set("models.default", json!("llama3.1:8b"), ConfigScope::Global)?;
//! manager.set("models.default", json!("codellama:7b"), ConfigScope::User)?;
//!
//! assert_eq!(manager.get("models.default")?, Some(json!("codellama:7b")));
//! assert_eq!(
//!     manager.get_scoped("models.default", ConfigScope::Global, None)?,
//!     Some(json!("llama3.1:8b"))
//! );
//! # Ok(())
//! # }
//! ```

use crate::backup::{BackupInfo, BackupManager};
use crate::cache::{CacheKey, CacheScope, CacheStats, ResolutionCache};
use crate::document::{write_file, ConfigDocument};
use crate::error::{ConfigError, ConfigResult};
use crate::path::ConfigPath;
use crate::paths::{default_base_path, ConfigPaths};
use crate::records::{
    list_stems, load_record, load_team, save_record, PluginConfiguration, TeamConfiguration,
    ThemeConfiguration, UserPreferences,
};
use crate::scope::ConfigScope;
use crate::transfer::{read_configuration, ExportEnvelope};
use crate::validation::ValidatorRegistry;
use crate::watch::{notify, ConfigChange, WatcherId, WatcherRegistry};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Options for [`ConfigManager::set_with`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteOptions {
    discriminator: Option<String>,
    skip_validation: bool,
}

impl WriteOptions {
    /// Validate, use the manager's project/team context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Project path or team id selecting the document
    #[inline]
    #[must_use]
    pub fn with_discriminator(mut self, discriminator: impl Into<String>) -> Self {
        self.discriminator = Some(discriminator.into());
        self
    }

    /// Write without consulting validators
    #[inline]
    #[must_use]
    pub fn without_validation(mut self) -> Self {
        self.skip_validation = true;
        self
    }
}

/// Resolved location of one scope document
#[derive(Debug, Clone)]
struct Target {
    scope: ConfigScope,
    discriminator: Option<String>,
    /// `None` for the in-memory session document
    file: Option<PathBuf>,
}

impl Target {
    fn cache_scope(&self) -> CacheScope {
        CacheScope::scoped(self.scope, self.discriminator.as_deref())
    }
}

/// Configuration manager for one base path
///
/// All operations are synchronous. The cache and registries use interior
/// mutability, so reads and writes both take `&self`.
#[derive(Debug)]
pub struct ConfigManager {
    paths: ConfigPaths,
    project: Option<PathBuf>,
    team: Option<String>,
    session: RwLock<ConfigDocument>,
    cache: ResolutionCache,
    validators: RwLock<ValidatorRegistry>,
    watchers: RwLock<WatcherRegistry>,
    backups: BackupManager,
}

impl ConfigManager {
    /// Manager rooted at `base_path`, with the default validators
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        Self {
            paths: ConfigPaths::new(base_path.clone()),
            project: None,
            team: None,
            session: RwLock::new(ConfigDocument::in_memory()),
            cache: ResolutionCache::new(),
            validators: RwLock::new(ValidatorRegistry::with_defaults()),
            watchers: RwLock::new(WatcherRegistry::new()),
            backups: BackupManager::new(base_path),
        }
    }

    /// Manager rooted at `~/.codegenie`
    #[must_use]
    pub fn open_default() -> Self {
        Self::new(default_base_path())
    }

    /// Current project, consulted during hierarchy resolution
    #[must_use]
    pub fn with_project(mut self, project: impl Into<PathBuf>) -> Self {
        self.project = Some(project.into());
        self.cache.clear();
        self
    }

    /// Current team, consulted during hierarchy resolution
    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team = Some(team_id.into());
        self.cache.clear();
        self
    }

    /// Replace the validator set
    #[must_use]
    pub fn with_validators(self, validators: ValidatorRegistry) -> Self {
        *self.validators.write() = validators;
        self
    }

    /// File layout
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &ConfigPaths {
        &self.paths
    }

    /// Base directory
    #[inline]
    #[must_use]
    pub fn base_path(&self) -> &Path {
        self.paths.base()
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    /// Resolve a key across the hierarchy
    ///
    /// Writes invalidate cached entries by exact key only. After replacing or
    /// deleting a parent such as `models`, a cached `models.default` is still
    /// served; call [`ConfigManager::clear_cache`] after subtree writes.
    ///
    /// # Errors
    /// Returns an error for an invalid key or an unreadable document.
    pub fn get(&self, key: &str) -> ConfigResult<Option<Value>> {
        let path = ConfigPath::parse(key)?;
        let cache_key = CacheKey::new(CacheScope::Auto, path.to_string());
        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!(key = %path, scope = "auto", "Config cache hit");
            return Ok(cached);
        }

        let mut resolved = None;
        for scope in ConfigScope::RESOLUTION_ORDER {
            let skip = match scope {
                ConfigScope::Project => self.project.is_none(),
                ConfigScope::Team => self.team.is_none(),
                _ => false,
            };
            if skip {
                continue;
            }
            let target = self.target(scope, None)?;
            if let Some(value) = self.lookup(&target, &path)? {
                tracing::debug!(key = %path, scope = %scope, "Resolved config key");
                resolved = Some(value);
                break;
            }
        }

        self.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    /// Resolve a key across the hierarchy, falling back to `default`
    ///
    /// # Errors
    /// Same as [`ConfigManager::get`].
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> ConfigResult<Value> {
        Ok(self.get(key)?.unwrap_or_else(|| default.into()))
    }

    /// Read a key from one scope only
    ///
    /// `discriminator` falls back to the manager's project/team context.
    ///
    /// # Errors
    /// - [`ConfigError::MissingDiscriminator`] for PROJECT/TEAM without one
    /// - document load errors
    pub fn get_scoped(
        &self,
        key: &str,
        scope: ConfigScope,
        discriminator: Option<&str>,
    ) -> ConfigResult<Option<Value>> {
        let path = ConfigPath::parse(key)?;
        let target = self.target(scope, discriminator)?;
        let cache_key = CacheKey::new(target.cache_scope(), path.to_string());
        if let Some(cached) = self.cache.get(&cache_key) {
            tracing::debug!(key = %path, scope = %cache_key.scope, "Config cache hit");
            return Ok(cached);
        }

        let resolved = self.lookup(&target, &path)?;
        self.cache.insert(cache_key, resolved.clone());
        Ok(resolved)
    }

    /// Read a key from one scope only, falling back to `default`
    ///
    /// # Errors
    /// Same as [`ConfigManager::get_scoped`].
    pub fn get_scoped_or(
        &self,
        key: &str,
        scope: ConfigScope,
        discriminator: Option<&str>,
        default: impl Into<Value>,
    ) -> ConfigResult<Value> {
        Ok(self
            .get_scoped(key, scope, discriminator)?
            .unwrap_or_else(|| default.into()))
    }

    /// Resolve and deserialize a key
    ///
    /// With `scope` set, only that scope is read.
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if the value has the wrong shape.
    pub fn get_as<T: DeserializeOwned>(
        &self,
        key: &str,
        scope: Option<ConfigScope>,
    ) -> ConfigResult<Option<T>> {
        let value = match scope {
            Some(scope) => self.get_scoped(key, scope, None)?,
            None => self.get(key)?,
        };
        value
            .map(|v| {
                serde_json::from_value(v)
                    .map_err(|e| ConfigError::Serialize(format!("'{key}': {e}")))
            })
            .transpose()
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write a key, validating it and using the manager's context
    ///
    /// # Errors
    /// See [`ConfigManager::set_with`].
    pub fn set(&self, key: &str, value: impl Into<Value>, scope: ConfigScope) -> ConfigResult<()> {
        self.set_with(key, value, scope, &WriteOptions::new())
    }

    /// Write a key
    ///
    /// # Errors
    /// - [`ConfigError::ValidationFailed`] before any I/O if a validator rejects
    /// - [`ConfigError::ValidationFailed`] if a TEAM write would give a
    ///   [`TeamConfiguration`] field the wrong type; nothing is saved
    /// - [`ConfigError::MissingDiscriminator`] for PROJECT/TEAM without one
    /// - document load/save errors; the cache is untouched in that case
    pub fn set_with(
        &self,
        key: &str,
        value: impl Into<Value>,
        scope: ConfigScope,
        options: &WriteOptions,
    ) -> ConfigResult<()> {
        let path = ConfigPath::parse(key)?;
        let value = value.into();
        let key = path.to_string();

        if !options.skip_validation && !self.validators.read().check(&key, &value) {
            return Err(ConfigError::ValidationFailed { key, value });
        }

        let target = self.target(scope, options.discriminator.as_deref())?;
        self.modify(&target, |document| {
            document.set(&path, value.clone());
            ((), true)
        })?;

        let invalidated = self.cache.invalidate_key(&key);
        tracing::info!(key = %key, scope = %scope, invalidated, "Set config value");

        self.notify(ConfigChange {
            key,
            value: Some(value),
            scope,
        });
        Ok(())
    }

    /// Delete a key using the manager's context
    ///
    /// # Errors
    /// See [`ConfigManager::delete_with`].
    pub fn delete(&self, key: &str, scope: ConfigScope) -> ConfigResult<bool> {
        self.delete_with(key, scope, None)
    }

    /// Delete a key; returns false if it was not present
    ///
    /// Deleting an absent key writes nothing and fires no watchers.
    ///
    /// # Errors
    /// - [`ConfigError::MissingDiscriminator`] for PROJECT/TEAM without one
    /// - document load/save errors
    pub fn delete_with(
        &self,
        key: &str,
        scope: ConfigScope,
        discriminator: Option<&str>,
    ) -> ConfigResult<bool> {
        let path = ConfigPath::parse(key)?;
        let key = path.to_string();
        let target = self.target(scope, discriminator)?;

        let removed = self.modify(&target, |document| {
            let removed = document.remove(&path).is_some();
            (removed, removed)
        })?;
        if !removed {
            tracing::debug!(key = %key, scope = %scope, "Delete of absent config key");
            return Ok(false);
        }

        let invalidated = self.cache.invalidate_key(&key);
        tracing::info!(key = %key, scope = %scope, invalidated, "Deleted config value");

        self.notify(ConfigChange {
            key,
            value: None,
            scope,
        });
        Ok(true)
    }

    // ------------------------------------------------------------------
    // Validators and watchers
    // ------------------------------------------------------------------

    /// Register a write validator for `key`, replacing any previous one
    pub fn register_validator<F>(&self, key: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validators.write().register(key, predicate);
    }

    /// Register a watcher for `key`
    pub fn watch<F>(&self, key: impl Into<String>, callback: F) -> WatcherId
    where
        F: Fn(&ConfigChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.watchers.write().watch(key, callback)
    }

    /// Remove a watcher
    pub fn unwatch(&self, id: WatcherId) -> bool {
        self.watchers.write().unwatch(id)
    }

    fn notify(&self, change: ConfigChange) {
        // Release the lock before running callbacks so they may register more
        let watchers = self.watchers.read().watchers_for(&change.key);
        if watchers.is_empty() {
            return;
        }
        let failures = notify(&watchers, &change);
        tracing::debug!(
            key = %change.key,
            scope = %change.scope,
            watchers = watchers.len(),
            failures,
            "Notified config watchers"
        );
    }

    // ------------------------------------------------------------------
    // Backup and restore
    // ------------------------------------------------------------------

    /// Snapshot global, user, team, plugin and theme configuration
    ///
    /// # Errors
    /// See [`BackupManager::create`].
    pub fn backup(&self, name: Option<&str>) -> ConfigResult<BackupInfo> {
        self.backups.create(name)
    }

    /// Restore a snapshot and clear the cache
    ///
    /// # Errors
    /// See [`BackupManager::restore`].
    pub fn restore(&self, name: &str) -> ConfigResult<()> {
        self.backups.restore(name)?;
        self.cache.clear();
        Ok(())
    }

    /// Names of existing backups
    ///
    /// # Errors
    /// Returns an error if the backups directory cannot be read.
    pub fn list_backups(&self) -> ConfigResult<Vec<String>> {
        self.backups.list()
    }

    /// Metadata of one backup
    ///
    /// # Errors
    /// Returns [`ConfigError::BackupNotFound`] if there is no such backup.
    pub fn backup_info(&self, name: &str) -> ConfigResult<BackupInfo> {
        self.backups.info(name)
    }

    /// Remove a backup
    ///
    /// # Errors
    /// Returns an error if the backup exists but cannot be removed.
    pub fn delete_backup(&self, name: &str) -> ConfigResult<bool> {
        self.backups.delete(name)
    }

    // ------------------------------------------------------------------
    // Import and export
    // ------------------------------------------------------------------

    /// Write one scope's document wrapped in an [`ExportEnvelope`]
    ///
    /// The format follows the extension of `file`.
    ///
    /// # Errors
    /// Returns an error if the scope cannot be read or the file written.
    pub fn export(
        &self,
        scope: ConfigScope,
        file: impl AsRef<Path>,
        discriminator: Option<&str>,
    ) -> ConfigResult<()> {
        let file = file.as_ref();
        let target = self.target(scope, discriminator)?;
        let configuration = self.read(&target, |document| document.data().clone())?;
        let keys = configuration.len();

        write_file(file, &ExportEnvelope::new(scope, configuration))?;
        tracing::info!(scope = %scope, file = %file.display(), keys, "Exported configuration");
        Ok(())
    }

    /// Load an exported document into a scope
    ///
    /// With `merge`, top-level keys from the file overwrite existing ones and
    /// other keys survive; nested mappings are replaced, not merged. Without
    /// it the document is replaced. The whole cache is cleared afterward.
    /// Watchers are not notified.
    ///
    /// # Errors
    /// - [`ConfigError::MalformedEnvelope`] before any mutation
    /// - [`ConfigError::MissingDiscriminator`] for PROJECT/TEAM without one
    /// - document load/save errors
    pub fn import(
        &self,
        file: impl AsRef<Path>,
        scope: ConfigScope,
        discriminator: Option<&str>,
        merge: bool,
    ) -> ConfigResult<()> {
        let file = file.as_ref();
        let configuration = read_configuration(file)?;
        let target = self.target(scope, discriminator)?;
        let keys = configuration.len();

        self.modify(&target, move |document| {
            if merge {
                document.merge_top_level(configuration);
            } else {
                document.replace(configuration);
            }
            ((), true)
        })?;
        self.cache.clear();

        tracing::info!(scope = %scope, file = %file.display(), keys, merge, "Imported configuration");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Typed records
    // ------------------------------------------------------------------

    /// Load user preferences; defaults if none are saved
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_user_preferences(&self) -> ConfigResult<UserPreferences> {
        Ok(load_record(&self.paths.user_preferences())?.unwrap_or_default())
    }

    /// Validate and save user preferences
    ///
    /// # Errors
    /// Returns [`ConfigError::ValidationFailed`] or a write error.
    pub fn save_user_preferences(&self, preferences: &UserPreferences) -> ConfigResult<()> {
        preferences.validate()?;
        save_record(&self.paths.user_preferences(), preferences)
    }

    /// Load a team's configuration
    ///
    /// Fields edited by hand into the wrong type read as defaults and are
    /// logged.
    ///
    /// # Errors
    /// Returns an error for an invalid team id or unreadable file.
    pub fn load_team_configuration(&self, team_id: &str) -> ConfigResult<Option<TeamConfiguration>> {
        load_team(&self.paths.team_config(team_id)?)
    }

    /// Save a team's configuration under its `team_id`
    ///
    /// This file also backs TEAM scope lookups, so the cache is cleared.
    ///
    /// # Errors
    /// Returns an error for an invalid team id or failed write.
    pub fn save_team_configuration(&self, team: &TeamConfiguration) -> ConfigResult<()> {
        save_record(&self.paths.team_config(&team.team_id)?, team)?;
        self.cache.clear();
        Ok(())
    }

    /// Load a plugin's configuration
    ///
    /// # Errors
    /// Returns an error for an invalid plugin id or unreadable file.
    pub fn load_plugin_configuration(
        &self,
        plugin_id: &str,
    ) -> ConfigResult<Option<PluginConfiguration>> {
        load_record(&self.paths.plugin_config(plugin_id)?)
    }

    /// Save a plugin's configuration under its `plugin_id`
    ///
    /// # Errors
    /// Returns an error for an invalid plugin id or failed write.
    pub fn save_plugin_configuration(&self, plugin: &PluginConfiguration) -> ConfigResult<()> {
        save_record(&self.paths.plugin_config(&plugin.plugin_id)?, plugin)
    }

    /// Load a theme
    ///
    /// # Errors
    /// Returns an error for an invalid name or unreadable file.
    pub fn load_theme(&self, name: &str) -> ConfigResult<Option<ThemeConfiguration>> {
        load_record(&self.paths.theme_config(name)?)
    }

    /// Save a theme under its `name`
    ///
    /// # Errors
    /// Returns an error for an invalid name or failed write.
    pub fn save_theme(&self, theme: &ThemeConfiguration) -> ConfigResult<()> {
        save_record(&self.paths.theme_config(&theme.name)?, theme)
    }

    /// Ids of teams with a configuration file
    ///
    /// # Errors
    /// Returns an error if the teams directory cannot be read.
    pub fn list_teams(&self) -> ConfigResult<Vec<String>> {
        list_stems(&self.paths.teams_dir())
    }

    /// Ids of plugins with a configuration file
    ///
    /// # Errors
    /// Returns an error if the plugins directory cannot be read.
    pub fn list_plugins(&self) -> ConfigResult<Vec<String>> {
        list_stems(&self.paths.plugins_dir())
    }

    /// Names of saved themes
    ///
    /// # Errors
    /// Returns an error if the themes directory cannot be read.
    pub fn list_themes(&self) -> ConfigResult<Vec<String>> {
        list_stems(&self.paths.themes_dir())
    }

    // ------------------------------------------------------------------
    // Cache control
    // ------------------------------------------------------------------

    /// Drop every cached resolution
    #[inline]
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Cache statistics
    #[inline]
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    // ------------------------------------------------------------------
    // Document access
    // ------------------------------------------------------------------

    fn target(&self, scope: ConfigScope, discriminator: Option<&str>) -> ConfigResult<Target> {
        let (discriminator, file) = match scope {
            ConfigScope::Session => (None, None),
            ConfigScope::Global => (None, Some(self.paths.global_config())),
            ConfigScope::User => (None, Some(self.paths.user_config())),
            ConfigScope::Project => {
                let project = discriminator
                    .map(PathBuf::from)
                    .or_else(|| self.project.clone())
                    .ok_or(ConfigError::MissingDiscriminator { scope })?;
                let file = ConfigPaths::project_config(&project);
                (Some(project.display().to_string()), Some(file))
            }
            ConfigScope::Team => {
                let team = discriminator
                    .or(self.team.as_deref())
                    .ok_or(ConfigError::MissingDiscriminator { scope })?;
                (Some(team.to_string()), Some(self.paths.team_config(team)?))
            }
        };
        Ok(Target {
            scope,
            discriminator,
            file,
        })
    }

    /// Non-null value at `path` in one scope
    fn lookup(&self, target: &Target, path: &ConfigPath) -> ConfigResult<Option<Value>> {
        self.read(target, |document| {
            document.get(path).filter(|v| !v.is_null()).cloned()
        })
    }

    fn read<R>(&self, target: &Target, f: impl FnOnce(&ConfigDocument) -> R) -> ConfigResult<R> {
        match &target.file {
            None => Ok(f(&self.session.read())),
            Some(file) => Ok(f(&ConfigDocument::load(file)?)),
        }
    }

    /// Load, mutate and (if the closure reports a change) save a document
    fn modify<R>(
        &self,
        target: &Target,
        f: impl FnOnce(&mut ConfigDocument) -> (R, bool),
    ) -> ConfigResult<R> {
        match &target.file {
            None => Ok(f(&mut self.session.write()).0),
            Some(file) => {
                let mut document = ConfigDocument::load(file)?;
                let before = team_rejections(target, &document);
                let (result, changed) = f(&mut document);
                if changed {
                    if let Some(broken) = team_rejections(target, &document)
                        .into_iter()
                        .find(|field| !before.contains(field))
                    {
                        let value = document.data().get(&broken).cloned().unwrap_or(Value::Null);
                        return Err(ConfigError::ValidationFailed { key: broken, value });
                    }
                    document.save()?;
                }
                Ok(result)
            }
        }
    }
}

/// [`TeamConfiguration`] fields a TEAM document holds with the wrong type
///
/// The team record shares its file with TEAM scope, so writes that would make
/// it unreadable are refused. Fields already broken before the write are left
/// to [`ConfigManager::load_team_configuration`].
fn team_rejections(target: &Target, document: &ConfigDocument) -> Vec<String> {
    if target.scope != ConfigScope::Team {
        return Vec::new();
    }
    TeamConfiguration::from_document(document.data().clone()).1
}
