//! Rollout options loaded from the environment.

use std::time::Duration;

use anyhow::{Context, Result};

use crate::instance::LogicalId;
use crate::settings::{GroupSettings, LeaderSelfUpdatePolicy};
use crate::DEFAULT_POLL_INTERVAL;

pub const ENV_POLL_INTERVAL_MS: &str = "FLEET_GROUP_POLL_INTERVAL_MS";
pub const ENV_SELF_LOGICAL_ID: &str = "FLEET_GROUP_SELF_LOGICAL_ID";
pub const ENV_POLICY_LEADER_SELF_UPDATE: &str = "FLEET_GROUP_POLICY_LEADER_SELF_UPDATE";

/// Options for running rolling updates on this controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolloutConfig {
    /// Interval between quiescence polls.
    pub poll_interval: Duration,

    /// Logical id of the node this controller runs on.
    pub self_id: Option<LogicalId>,

    /// Whether the controller may replace its own node.
    pub policy: LeaderSelfUpdatePolicy,
}

impl Default for RolloutConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            self_id: None,
            policy: LeaderSelfUpdatePolicy::default(),
        }
    }
}

impl RolloutConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let poll_interval = match lookup(ENV_POLL_INTERVAL_MS) {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid {ENV_POLL_INTERVAL_MS}: {raw:?}"))?;
                if ms == 0 {
                    anyhow::bail!("{ENV_POLL_INTERVAL_MS} must be greater than zero");
                }
                Duration::from_millis(ms)
            }
            None => DEFAULT_POLL_INTERVAL,
        };

        // Empty string means "no self id"
        let self_id = lookup(ENV_SELF_LOGICAL_ID)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(LogicalId::new);

        let policy = match lookup(ENV_POLICY_LEADER_SELF_UPDATE) {
            Some(raw) => raw
                .parse::<LeaderSelfUpdatePolicy>()
                .with_context(|| format!("invalid {ENV_POLICY_LEADER_SELF_UPDATE}"))?,
            None => LeaderSelfUpdatePolicy::default(),
        };

        Ok(Self {
            poll_interval,
            self_id,
            policy,
        })
    }

    /// Copy the self-protection options onto group settings.
    pub fn apply(&self, mut settings: GroupSettings) -> GroupSettings {
        settings.self_id = self.self_id.clone();
        settings.policy = self.policy;
        settings
    }
}
