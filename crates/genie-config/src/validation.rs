//! Write-time validators
//!
//! Provides [`ValidatorRegistry`], mapping dotted keys to predicates that
//! gate writes.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Predicate deciding whether a value may be written
pub type Validator = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Skill levels accepted by `skill_level`
pub const SKILL_LEVELS: [&str; 4] = ["beginner", "intermediate", "advanced", "expert"];

/// Registry of validators keyed by dotted key
///
/// Registering a key again replaces its validator.
#[derive(Clone, Default)]
pub struct ValidatorRegistry {
    validators: HashMap<String, Validator>,
}

impl ValidatorRegistry {
    /// Create new empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            validators: HashMap::new(),
        }
    }

    /// Create registry with the preference schema validators
    ///
    /// - `learning_rate`: number in `[0, 1]`
    /// - `models.default`: non-empty string
    /// - `skill_level`: one of [`SKILL_LEVELS`]
    /// - `code_style.indent_size`: integer in `1..=16`
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("learning_rate", is_unit_interval);
        registry.register("models.default", |v| {
            v.as_str().is_some_and(|s| !s.trim().is_empty())
        });
        registry.register("skill_level", |v| {
            v.as_str().is_some_and(|s| SKILL_LEVELS.contains(&s))
        });
        registry.register("code_style.indent_size", |v| {
            v.as_u64().is_some_and(|n| (1..=16).contains(&n))
        });
        registry
    }

    /// Register a validator, replacing any previous one for `key`
    pub fn register<F>(&mut self, key: impl Into<String>, predicate: F)
    where
        F: Fn(&Value) -> bool + Send + Sync + 'static,
    {
        self.validators.insert(key.into(), Arc::new(predicate));
    }

    /// Remove validator
    #[inline]
    pub fn remove(&mut self, key: &str) -> bool {
        self.validators.remove(key).is_some()
    }

    /// Check if a validator exists for `key`
    #[inline]
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.validators.contains_key(key)
    }

    /// Run the validator for `key`; keys without one always pass
    #[must_use]
    pub fn check(&self, key: &str, value: &Value) -> bool {
        self.validators.get(key).map_or(true, |validate| validate(value))
    }

    /// Get number of registered validators
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    /// Check if registry is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}

impl fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.validators.keys().collect();
        keys.sort();
        f.debug_struct("ValidatorRegistry").field("keys", &keys).finish()
    }
}

/// Number within `[0, 1]`
#[must_use]
pub fn is_unit_interval(value: &Value) -> bool {
    value.as_f64().is_some_and(|n| (0.0..=1.0).contains(&n))
}
