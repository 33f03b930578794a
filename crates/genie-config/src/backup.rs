//! Snapshots of the configuration tree
//!
//! A backup is a recursive copy of the `global`, `user`, `teams`, `plugins`
//! and `themes` directories under `<base>/backups/<name>/`, plus a
//! `manifest.json`. Session state is in memory and project configuration
//! lives inside each project, so neither is captured.
//!
//! Both directions stage their copies in a hidden temporary directory and
//! move them into place by rename:
//!
//! ```text
//! create:  live dirs ──copy──▶ backups/.staging-XXXX ──rename──▶ backups/<name>
//!
//! restore: backups/<name>/<dir> ──copy──▶ .restore-XXXX/<dir>.new
//!          live <dir> ──rename──▶ .restore-XXXX/<dir>.old
//!          .restore-XXXX/<dir>.new ──rename──▶ live <dir>
//! ```
//!
//! If any swap fails, directories already swapped are put back from their
//! `.old` copies before the error is returned.

use crate::document::{read_file, write_file};
use crate::error::{ConfigError, ConfigResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Directories captured by a backup, relative to the base path
pub const BACKUP_DIRECTORIES: [&str; 5] = ["global", "user", "teams", "plugins", "themes"];

/// Directory under the base path holding backups
pub const BACKUPS_DIR: &str = "backups";

/// Manifest written into every backup
pub const MANIFEST_FILE: &str = "manifest.json";

/// Metadata describing one backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupInfo {
    /// Backup name (directory name)
    pub name: String,
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
    /// Crate version that wrote the backup
    pub version: String,
    /// Directories that existed and were copied
    pub directories: Vec<String>,
}

/// Creates, lists and restores backups under one base path
#[derive(Debug, Clone)]
pub struct BackupManager {
    base_path: PathBuf,
}

impl BackupManager {
    /// Manager for the tree rooted at `base_path`
    #[inline]
    #[must_use]
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// `<base>/backups`
    #[inline]
    #[must_use]
    pub fn backups_dir(&self) -> PathBuf {
        self.base_path.join(BACKUPS_DIR)
    }

    /// Take a snapshot
    ///
    /// Without a name, `backup_%Y%m%d_%H%M%S` (UTC) is used, suffixed with a
    /// counter if that name is already taken.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidName`] for names unusable as a directory
    /// - [`ConfigError::BackupExists`] if an explicit name is taken
    /// - [`ConfigError::Io`] if copying fails; no backup is left behind
    pub fn create(&self, name: Option<&str>) -> ConfigResult<BackupInfo> {
        let backups_dir = self.backups_dir();
        fs::create_dir_all(&backups_dir).map_err(|e| ConfigError::io_error(&backups_dir, e))?;

        let name = match name {
            Some(name) => {
                validate_name("backup", name)?;
                if backups_dir.join(name).exists() {
                    return Err(ConfigError::BackupExists(name.to_string()));
                }
                name.to_string()
            }
            None => self.generate_name(&backups_dir),
        };

        let staging = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(&backups_dir)
            .map_err(|e| ConfigError::io_error(&backups_dir, e))?;

        let mut directories = Vec::new();
        for dir in BACKUP_DIRECTORIES {
            let source = self.base_path.join(dir);
            if source.is_dir() {
                copy_tree(&source, &staging.path().join(dir))?;
                directories.push(dir.to_string());
            }
        }

        let info = BackupInfo {
            name: name.clone(),
            created_at: Utc::now(),
            version: crate::VERSION.to_string(),
            directories,
        };
        write_file(&staging.path().join(MANIFEST_FILE), &info)?;

        let target = backups_dir.join(&name);
        fs::rename(staging.path(), &target).map_err(|e| ConfigError::io_error(&target, e))?;

        tracing::info!(
            backup = %name,
            directories = ?info.directories,
            "Created configuration backup"
        );
        Ok(info)
    }

    /// Replace live directories with the contents of a backup
    ///
    /// # Errors
    /// - [`ConfigError::BackupNotFound`] before anything is touched
    /// - [`ConfigError::Io`] if staging the copies fails; live state untouched
    /// - [`ConfigError::Restore`] if a swap fails; earlier swaps rolled back
    pub fn restore(&self, name: &str) -> ConfigResult<Vec<String>> {
        validate_name("backup", name)?;
        let source = self.backups_dir().join(name);
        if !source.is_dir() {
            return Err(ConfigError::BackupNotFound(name.to_string()));
        }

        let mut directories = Vec::new();
        for entry in fs::read_dir(&source).map_err(|e| ConfigError::io_error(&source, e))? {
            let entry = entry.map_err(|e| ConfigError::io_error(&source, e))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !file_name.starts_with('.') {
                directories.push(file_name);
            }
        }
        directories.sort();

        fs::create_dir_all(&self.base_path)
            .map_err(|e| ConfigError::io_error(&self.base_path, e))?;
        let staging = tempfile::Builder::new()
            .prefix(".restore-")
            .tempdir_in(&self.base_path)
            .map_err(|e| ConfigError::io_error(&self.base_path, e))?;

        let mut swaps = Vec::with_capacity(directories.len());
        for dir in &directories {
            let staged = staging.path().join(format!("{dir}.new"));
            copy_tree(&source.join(dir), &staged)?;
            swaps.push(Swap {
                name: dir.clone(),
                live: self.base_path.join(dir),
                staged,
                stash: staging.path().join(format!("{dir}.old")),
            });
        }

        swap_all(&swaps, |from, to| fs::rename(from, to))?;

        tracing::info!(backup = %name, directories = ?directories, "Restored configuration backup");
        Ok(directories)
    }

    /// Names of existing backups, sorted
    ///
    /// # Errors
    /// Returns an error if the backups directory exists but cannot be read.
    pub fn list(&self) -> ConfigResult<Vec<String>> {
        let dir = self.backups_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(ConfigError::io_error(&dir, e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| ConfigError::io_error(&dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !name.starts_with('.') {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Metadata of a backup
    ///
    /// Backups without a manifest report their directory modification time
    /// and the directories they contain.
    ///
    /// # Errors
    /// Returns [`ConfigError::BackupNotFound`] if there is no such backup.
    pub fn info(&self, name: &str) -> ConfigResult<BackupInfo> {
        validate_name("backup", name)?;
        let dir = self.backups_dir().join(name);
        if !dir.is_dir() {
            return Err(ConfigError::BackupNotFound(name.to_string()));
        }
        if let Some(info) = read_file::<BackupInfo>(&dir.join(MANIFEST_FILE))? {
            return Ok(info);
        }

        let modified = fs::metadata(&dir)
            .and_then(|m| m.modified())
            .map_err(|e| ConfigError::io_error(&dir, e))?;
        let directories = BACKUP_DIRECTORIES
            .iter()
            .filter(|d| dir.join(d).is_dir())
            .map(|d| (*d).to_string())
            .collect();
        Ok(BackupInfo {
            name: name.to_string(),
            created_at: DateTime::<Utc>::from(modified),
            version: String::from("unknown"),
            directories,
        })
    }

    /// Remove a backup; returns false if it did not exist
    ///
    /// # Errors
    /// Returns an error if the backup exists but cannot be removed.
    pub fn delete(&self, name: &str) -> ConfigResult<bool> {
        validate_name("backup", name)?;
        let dir = self.backups_dir().join(name);
        if !dir.is_dir() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|e| ConfigError::io_error(&dir, e))?;
        tracing::info!(backup = %name, "Deleted configuration backup");
        Ok(true)
    }

    fn generate_name(&self, backups_dir: &Path) -> String {
        let stem = Utc::now().format("backup_%Y%m%d_%H%M%S").to_string();
        if !backups_dir.join(&stem).exists() {
            return stem;
        }
        (1..)
            .map(|n| format!("{stem}_{n}"))
            .find(|candidate| !backups_dir.join(candidate).exists())
            .unwrap_or(stem)
    }
}

/// Reject names that are not a single plain path component
///
/// # Errors
/// Returns [`ConfigError::InvalidName`] for empty names, names starting with
/// `.`, or names containing path separators.
pub fn validate_name(kind: &'static str, name: &str) -> ConfigResult<()> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(ConfigError::invalid_name(kind, name));
    }
    Ok(())
}

/// Recursively copy `source` to `target`
///
/// # Errors
/// Returns the first I/O error encountered; `target` may be partially
/// written.
pub fn copy_tree(source: &Path, target: &Path) -> ConfigResult<()> {
    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(source).to_path_buf();
            ConfigError::io_error(path, io::Error::from(e))
        })?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|e| ConfigError::io_error(entry.path(), io::Error::other(e)))?;
        let dest = target.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| ConfigError::io_error(&dest, e))?;
        } else {
            fs::copy(entry.path(), &dest).map_err(|e| ConfigError::io_error(entry.path(), e))?;
        }
    }
    Ok(())
}

/// One directory exchange during restore
#[derive(Debug)]
struct Swap {
    name: String,
    live: PathBuf,
    staged: PathBuf,
    stash: PathBuf,
}

/// Swap every staged directory into place, rolling back on failure
fn swap_all<F>(swaps: &[Swap], mut rename: F) -> ConfigResult<()>
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    // (index, live directory was stashed)
    let mut done: Vec<(usize, bool)> = Vec::with_capacity(swaps.len());

    for (i, swap) in swaps.iter().enumerate() {
        let stashed = swap.live.exists();
        let result = (|| {
            if stashed {
                rename(&swap.live, &swap.stash)
                    .map_err(|e| ConfigError::io_error(&swap.live, e))?;
            }
            if let Err(e) = rename(&swap.staged, &swap.live) {
                if stashed {
                    if let Err(undo) = rename(&swap.stash, &swap.live) {
                        tracing::error!(
                            directory = %swap.name,
                            error = %undo,
                            "Failed to put back live directory"
                        );
                    }
                }
                return Err(ConfigError::io_error(&swap.live, e));
            }
            Ok(())
        })();

        match result {
            Ok(()) => done.push((i, stashed)),
            Err(source) => {
                tracing::warn!(
                    directory = %swap.name,
                    error = %source,
                    rolled_back = done.len(),
                    "Restore swap failed, rolling back"
                );
                for &(j, was_stashed) in done.iter().rev() {
                    rollback(&swaps[j], was_stashed, &mut rename);
                }
                return Err(ConfigError::Restore {
                    directory: swap.name.clone(),
                    source: Box::new(source),
                });
            }
        }
    }
    Ok(())
}

fn rollback<F>(swap: &Swap, was_stashed: bool, rename: &mut F)
where
    F: FnMut(&Path, &Path) -> io::Result<()>,
{
    if let Err(e) = fs::remove_dir_all(&swap.live) {
        if e.kind() != io::ErrorKind::NotFound {
            tracing::error!(directory = %swap.name, error = %e, "Rollback could not clear directory");
            return;
        }
    }
    if was_stashed {
        if let Err(e) = rename(&swap.stash, &swap.live) {
            tracing::error!(directory = %swap.name, error = %e, "Rollback could not restore directory");
        }
    }
}
