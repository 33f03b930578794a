//! Change notification
//!
//! Watchers are callbacks registered per dotted key. They run synchronously
//! after a successful write or delete, in registration order. A watcher that
//! returns an error or panics is logged and skipped; the caller never sees it
//! and later watchers still run.

use crate::scope::ConfigScope;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Notification passed to watchers
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigChange {
    /// Dotted key that changed
    pub key: String,
    /// New value; `None` after a delete
    pub value: Option<Value>,
    /// Scope that was written
    pub scope: ConfigScope,
}

/// Watcher callback
pub type WatchCallback = Arc<dyn Fn(&ConfigChange) -> anyhow::Result<()> + Send + Sync>;

/// Handle returned by registration, used for unwatching and in logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatcherId(u64);

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watcher-{}", self.0)
    }
}

/// Registry of watchers keyed by dotted key
#[derive(Default)]
pub struct WatcherRegistry {
    watchers: HashMap<String, Vec<(WatcherId, WatchCallback)>>,
    next_id: u64,
}

impl WatcherRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a watcher for `key`
    pub fn watch<F>(&mut self, key: impl Into<String>, callback: F) -> WatcherId
    where
        F: Fn(&ConfigChange) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = WatcherId(self.next_id);
        self.next_id += 1;
        self.watchers
            .entry(key.into())
            .or_default()
            .push((id, Arc::new(callback)));
        id
    }

    /// Remove a watcher; returns false if the id is unknown
    pub fn unwatch(&mut self, id: WatcherId) -> bool {
        let mut found = false;
        self.watchers.retain(|_, list| {
            let before = list.len();
            list.retain(|(wid, _)| *wid != id);
            found |= list.len() != before;
            !list.is_empty()
        });
        found
    }

    /// Watchers registered for `key`, in registration order
    #[must_use]
    pub fn watchers_for(&self, key: &str) -> Vec<(WatcherId, WatchCallback)> {
        self.watchers.get(key).cloned().unwrap_or_default()
    }

    /// Number of watchers for `key`
    #[inline]
    #[must_use]
    pub fn count(&self, key: &str) -> usize {
        self.watchers.get(key).map_or(0, Vec::len)
    }
}

impl fmt::Debug for WatcherRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let counts: HashMap<&str, usize> = self
            .watchers
            .iter()
            .map(|(k, v)| (k.as_str(), v.len()))
            .collect();
        f.debug_struct("WatcherRegistry")
            .field("watchers", &counts)
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// Invoke watchers for a change
///
/// Returns how many watchers failed.
pub fn notify(watchers: &[(WatcherId, WatchCallback)], change: &ConfigChange) -> usize {
    let mut failures = 0;
    for (id, callback) in watchers {
        match catch_unwind(AssertUnwindSafe(|| callback(change))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                failures += 1;
                tracing::warn!(
                    key = %change.key,
                    scope = %change.scope,
                    watcher = %id,
                    error = %e,
                    "Config watcher failed"
                );
            }
            Err(panic) => {
                failures += 1;
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                tracing::warn!(
                    key = %change.key,
                    scope = %change.scope,
                    watcher = %id,
                    panic = %message,
                    "Config watcher panicked"
                );
            }
        }
    }
    failures
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use serde_json::json;

    fn change(key: &str, value: Option<Value>) -> ConfigChange {
        ConfigChange {
            key: key.to_string(),
            value,
            scope: ConfigScope::User,
        }
    }

    #[test]
    fn watchers_fire_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut registry = WatcherRegistry::new();
        for n in 0..3 {
            let log = Arc::clone(&log);
            registry.watch("x", move |_| {
                log.lock().push(n);
                Ok(())
            });
        }

        let failures = notify(&registry.watchers_for("x"), &change("x", Some(json!(1))));
        assert_eq!(failures, 0);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
    }

    #[test]
    fn failing_and_panicking_watchers_do_not_stop_others() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut registry = WatcherRegistry::new();
        registry.watch("x", |_| anyhow::bail!("boom"));
        registry.watch("x", |_| panic!("watcher exploded"));
        {
            let seen = Arc::clone(&seen);
            registry.watch("x", move |c| {
                seen.lock().push(c.clone());
                Ok(())
            });
        }

        let failures = notify(&registry.watchers_for("x"), &change("x", None));
        assert_eq!(failures, 2);
        assert_eq!(*seen.lock(), vec![change("x", None)]);
    }

    #[test]
    fn same_callback_registered_twice_fires_twice() {
        let count = Arc::new(Mutex::new(0));
        let mut registry = WatcherRegistry::new();
        let cb = {
            let count = Arc::clone(&count);
            move |_: &ConfigChange| {
                *count.lock() += 1;
                Ok::<(), anyhow::Error>(())
            }
        };
        registry.watch("x", cb.clone());
        registry.watch("x", cb);

        notify(&registry.watchers_for("x"), &change("x", Some(json!(true))));
        assert_eq!(*count.lock(), 2);
    }

    #[test]
    fn unwatch_removes_only_that_watcher() {
        let mut registry = WatcherRegistry::new();
        let a = registry.watch("x", |_| Ok(()));
        let b = registry.watch("x", |_| Ok(()));
        assert_ne!(a, b);
        assert_eq!(registry.count("x"), 2);

        assert!(registry.unwatch(a));
        assert_eq!(registry.count("x"), 1);
        assert!(!registry.unwatch(a));

        assert!(registry.unwatch(b));
        assert_eq!(registry.count("x"), 0);
    }

    #[test]
    fn unrelated_keys_have_no_watchers() {
        let mut registry = WatcherRegistry::new();
        registry.watch("models.default", |_| Ok(()));
        assert!(registry.watchers_for("models").is_empty());
        assert!(registry.watchers_for("models.default.x").is_empty());
    }
}
