//! Instance snapshot types.
//!
//! An [`InstanceDescription`] is an immutable view of one member of a group,
//! produced fresh on every list call. The controller never mutates them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::ConfigHash;

/// Tag carrying the config hash of the spec an instance was created from.
pub const CONFIG_HASH_TAG: &str = "fleet.config.hash";

/// Tag carrying the logical id, for backends without native logical ids.
pub const LOGICAL_ID_TAG: &str = "fleet.logical_id";

/// Opaque identifier assigned by the instance backend.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Stable per-slot identity, e.g. the second manager of a quorum.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LogicalId(String);

impl LogicalId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LogicalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LogicalId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Instance tags.
///
/// The well-known keys ([`CONFIG_HASH_TAG`], [`LOGICAL_ID_TAG`]) have typed
/// accessors; everything else is provider-specific and passed through as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.0.insert(key.into(), value.into())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The config hash tag, if present.
    pub fn config_hash(&self) -> Option<&str> {
        self.get(CONFIG_HASH_TAG)
    }

    /// The logical id tag, if present.
    pub fn logical_id(&self) -> Option<&str> {
        self.get(LOGICAL_ID_TAG)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// One instance as reported by the group backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub id: InstanceId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logical_id: Option<LogicalId>,

    #[serde(default)]
    pub tags: Tags,

    /// Backend-specific properties, passed through untouched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl InstanceDescription {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: InstanceId::new(id),
            logical_id: None,
            tags: Tags::new(),
            properties: None,
        }
    }

    pub fn with_logical_id(mut self, id: impl Into<String>) -> Self {
        self.logical_id = Some(LogicalId::new(id));
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key, value);
        self
    }

    pub fn with_config_hash(self, hash: &ConfigHash) -> Self {
        self.with_tag(CONFIG_HASH_TAG, hash.as_str())
    }

    pub fn with_properties(mut self, properties: serde_json::Value) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// Health as reported by the flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Health {
    Healthy,
    Unhealthy,
    /// Health cannot be determined. Never counted, never fatal.
    Unknown,
}

/// Why an instance is being destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DestroyReason {
    /// Replaced as part of a rolling update. The only reason this crate emits.
    RollingUpdate,
    Termination,
    Manual,
}

impl DestroyReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RollingUpdate => "rolling-update",
            Self::Termination => "termination",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for DestroyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
