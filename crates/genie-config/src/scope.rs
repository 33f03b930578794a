//! Configuration scopes and their precedence
//!
//! Provides [`ConfigScope`], the tier a configuration document belongs to.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Precedence tier of a configuration document
///
/// Resolution without an explicit scope walks
/// [`ConfigScope::RESOLUTION_ORDER`] and the first tier holding a value wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigScope {
    /// In-memory overrides for the running session
    Session,
    /// `<project>/.codegenie/config.yaml`
    Project,
    /// `<base>/teams/<team_id>.yaml`
    Team,
    /// `<base>/user/config.yaml`
    User,
    /// `<base>/global/config.yaml`
    Global,
}

impl ConfigScope {
    /// Highest precedence first
    pub const RESOLUTION_ORDER: [ConfigScope; 5] = [
        ConfigScope::Session,
        ConfigScope::Project,
        ConfigScope::Team,
        ConfigScope::User,
        ConfigScope::Global,
    ];

    /// Lowercase tag used in files, envelopes and logs
    #[inline]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Session => "session",
            Self::Project => "project",
            Self::Team => "team",
            Self::User => "user",
            Self::Global => "global",
        }
    }

    /// Project and team documents are selected by a path or id
    #[inline]
    #[must_use]
    pub fn requires_discriminator(self) -> bool {
        matches!(self, Self::Project | Self::Team)
    }

    /// Position in the resolution order (0 = highest precedence)
    #[inline]
    #[must_use]
    pub fn precedence(self) -> usize {
        match self {
            Self::Session => 0,
            Self::Project => 1,
            Self::Team => 2,
            Self::User => 3,
            Self::Global => 4,
        }
    }
}

impl Display for ConfigScope {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfigScope {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "session" => Ok(Self::Session),
            "project" => Ok(Self::Project),
            "team" => Ok(Self::Team),
            "user" => Ok(Self::User),
            "global" => Ok(Self::Global),
            _ => Err(ConfigError::UnknownScope(s.to_string())),
        }
    }
}
