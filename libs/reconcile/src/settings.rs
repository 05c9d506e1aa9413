//! Group settings for one side of a transition.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::hash::ConfigHash;
use crate::instance::LogicalId;

/// Whether the controller may replace the instance it runs on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaderSelfUpdatePolicy {
    /// The self instance is never destroyed, even when its config is stale.
    Never,

    /// The self instance is replaced, but only after every other instance.
    #[default]
    Last,
}

impl LeaderSelfUpdatePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Never => "never",
            Self::Last => "last",
        }
    }
}

impl std::fmt::Display for LeaderSelfUpdatePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid leader self-update policy '{0}': expected 'never' or 'last'")]
pub struct InvalidPolicy(pub String);

impl FromStr for LeaderSelfUpdatePolicy {
    type Err = InvalidPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "never" => Ok(Self::Never),
            "last" => Ok(Self::Last),
            _ => Err(InvalidPolicy(s.to_string())),
        }
    }
}

/// The configuration in force for one side of an update.
///
/// A rolling update holds two of these: the settings it is updating from and
/// the settings it is updating to. Allocation size is assumed constant for
/// the lifetime of an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSettings {
    /// Hash of the instance spec; instances tagged with it are up to date.
    pub config: ConfigHash,

    /// Number of instances the group should hold.
    pub allocation_size: usize,

    /// Logical id of the instance this controller runs on, if any.
    pub self_id: Option<LogicalId>,

    pub policy: LeaderSelfUpdatePolicy,
}

impl GroupSettings {
    pub fn new(config: ConfigHash, allocation_size: usize) -> Self {
        Self {
            config,
            allocation_size,
            self_id: None,
            policy: LeaderSelfUpdatePolicy::default(),
        }
    }

    /// Settings for an instance spec, hashing it to obtain the config tag.
    pub fn from_spec(spec: &serde_json::Value, allocation_size: usize) -> Self {
        Self::new(ConfigHash::from_spec(spec), allocation_size)
    }

    pub fn with_self(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(LogicalId::new(self_id));
        self
    }

    pub fn with_policy(mut self, policy: LeaderSelfUpdatePolicy) -> Self {
        self.policy = policy;
        self
    }
}
