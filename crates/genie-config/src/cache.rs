//! Read-through cache of resolved configuration values
//!
//! Entries are keyed by where the lookup was made (a concrete scope or the
//! automatic hierarchy walk) and the dotted key. Invalidation on write is by
//! exact key across every lookup location.

use crate::scope::ConfigScope;
use dashmap::DashMap;
use serde_json::Value;
use std::fmt::{self, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};

/// Where a cached lookup was resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheScope {
    /// Hierarchy walk without an explicit scope
    Auto,
    /// Explicit scope, with its project path or team id when it has one
    Scoped {
        /// Scope queried
        scope: ConfigScope,
        /// Project path or team id
        discriminator: Option<String>,
    },
}

impl CacheScope {
    /// Cache location for an explicit scope lookup
    #[inline]
    #[must_use]
    pub fn scoped(scope: ConfigScope, discriminator: Option<&str>) -> Self {
        Self::Scoped {
            scope,
            discriminator: discriminator.map(str::to_owned),
        }
    }
}

impl Display for CacheScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Scoped {
                scope,
                discriminator: None,
            } => write!(f, "{scope}"),
            Self::Scoped {
                scope,
                discriminator: Some(d),
            } => write!(f, "{scope}:{d}"),
        }
    }
}

/// Cache key: lookup location plus dotted key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lookup location
    pub scope: CacheScope,
    /// Dotted key as written by the caller
    pub key: String,
}

impl CacheKey {
    /// Create key
    #[inline]
    #[must_use]
    pub fn new(scope: CacheScope, key: impl Into<String>) -> Self {
        Self {
            scope,
            key: key.into(),
        }
    }
}

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that fell through to the documents
    pub misses: u64,
}

/// Resolved-value cache owned by one configuration manager
///
/// A cached `None` records that the lookup resolved to nothing, so repeated
/// misses do not touch the filesystem either.
#[derive(Debug, Default)]
pub struct ResolutionCache {
    entries: DashMap<CacheKey, Option<Value>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResolutionCache {
    /// Create empty cache
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached result for a key; outer `None` means not cached
    #[must_use]
    pub fn get(&self, key: &CacheKey) -> Option<Option<Value>> {
        match self.entries.get(key) {
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value().clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store a resolved result
    #[inline]
    pub fn insert(&self, key: CacheKey, value: Option<Value>) {
        self.entries.insert(key, value);
    }

    /// Drop every entry for this dotted key, whatever scope produced it
    ///
    /// Returns the number of entries removed.
    pub fn invalidate_key(&self, key: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| k.key != key);
        before - self.entries.len()
    }

    /// Drop every entry
    #[inline]
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Check if an entry exists without counting a hit or miss
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.entries.contains_key(key)
    }

    /// Get approximate entry count
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if cache holds no entries
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get cache statistics
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.entries.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}
