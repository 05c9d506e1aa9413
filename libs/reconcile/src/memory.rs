//! In-memory group backend.
//!
//! [`MemoryGroup`] keeps the group's instances in a list and replaces each
//! destroyed instance with one running the configured replacement config,
//! the way a scaler would. Used by tests and the rollout simulator.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::hash::ConfigHash;
use crate::instance::{DestroyReason, Health, InstanceDescription, InstanceId, LOGICAL_ID_TAG};
use crate::scaled::Scaled;

#[derive(Debug)]
struct GroupState {
    instances: Vec<InstanceDescription>,
    health: HashMap<InstanceId, Health>,
    destroyed: Vec<(InstanceId, DestroyReason)>,
    replacement: Option<ConfigHash>,
    replacement_health: Health,
}

/// A group held entirely in memory.
#[derive(Debug)]
pub struct MemoryGroup {
    state: RwLock<GroupState>,

    /// Counter for generating replacement ids.
    next_id: AtomicU64,

    /// Number of `list` calls served, including failed ones.
    list_calls: AtomicUsize,

    /// Whether `list` should fail.
    fail_list: AtomicBool,
}

impl MemoryGroup {
    /// Create a group with the given members. Every instance reports healthy
    /// until told otherwise, and destroyed instances are not replaced.
    pub fn new(instances: Vec<InstanceDescription>) -> Self {
        Self {
            state: RwLock::new(GroupState {
                instances,
                health: HashMap::new(),
                destroyed: Vec::new(),
                replacement: None,
                replacement_health: Health::Healthy,
            }),
            next_id: AtomicU64::new(0),
            list_calls: AtomicUsize::new(0),
            fail_list: AtomicBool::new(false),
        }
    }

    /// Replace every destroyed instance with one tagged with `config`.
    pub fn with_replacement(mut self, config: ConfigHash) -> Self {
        self.state.get_mut().replacement = Some(config);
        self
    }

    /// Health reported by replacements when they are created.
    pub fn with_replacement_health(mut self, health: Health) -> Self {
        self.state.get_mut().replacement_health = health;
        self
    }

    /// Override the health of one instance.
    pub async fn set_health(&self, id: &str, health: Health) {
        self.state.write().await.health.insert(InstanceId::new(id), health);
    }

    /// Override the health of every current instance tagged with `config`,
    /// and of replacements created from now on if they use it.
    pub async fn set_health_for_config(&self, config: &ConfigHash, health: Health) {
        let mut state = self.state.write().await;

        let ids: Vec<InstanceId> = state
            .instances
            .iter()
            .filter(|i| i.tags.config_hash() == Some(config.as_str()))
            .map(|i| i.id.clone())
            .collect();
        for id in ids {
            state.health.insert(id, health);
        }

        if state.replacement.as_ref() == Some(config) {
            state.replacement_health = health;
        }
    }

    /// Make `list` fail (or succeed again).
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Number of `list` calls served so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Current members of the group.
    pub async fn instances(&self) -> Vec<InstanceDescription> {
        self.state.read().await.instances.clone()
    }

    /// Every destroy issued so far, in order.
    pub async fn destroyed(&self) -> Vec<(InstanceId, DestroyReason)> {
        self.state.read().await.destroyed.clone()
    }

    /// Number of current members tagged with `config`.
    pub async fn count_with_config(&self, config: &ConfigHash) -> usize {
        self.state
            .read()
            .await
            .instances
            .iter()
            .filter(|i| i.tags.config_hash() == Some(config.as_str()))
            .count()
    }

    fn next_replacement_id(&self) -> InstanceId {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        InstanceId::new(format!("replacement-{n:04}"))
    }
}

#[async_trait]
impl Scaled for MemoryGroup {
    async fn list(&self) -> Result<Vec<InstanceDescription>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_list.load(Ordering::SeqCst) {
            anyhow::bail!("memory group configured to fail list");
        }

        Ok(self.instances().await)
    }

    async fn health(&self, instance: &InstanceDescription) -> Health {
        self.state
            .read()
            .await
            .health
            .get(&instance.id)
            .copied()
            .unwrap_or(Health::Healthy)
    }

    async fn destroy(&self, instance: &InstanceDescription, reason: DestroyReason) {
        let mut state = self.state.write().await;

        let Some(pos) = state.instances.iter().position(|i| i.id == instance.id) else {
            debug!(instance_id = %instance.id, "Destroy of unknown instance ignored");
            return;
        };

        let removed = state.instances.remove(pos);
        state.health.remove(&removed.id);
        state.destroyed.push((removed.id.clone(), reason));
        info!(instance_id = %removed.id, %reason, "Destroyed instance");

        let Some(config) = state.replacement.clone() else {
            return;
        };

        // The replacement takes over the slot, including its logical id
        let mut replacement = InstanceDescription::new(self.next_replacement_id().as_str())
            .with_config_hash(&config);
        if let Some(logical_id) = &removed.logical_id {
            replacement.logical_id = Some(logical_id.clone());
        }
        if let Some(tag) = removed.tags.logical_id() {
            replacement.tags.insert(LOGICAL_ID_TAG, tag);
        }

        let health = state.replacement_health;
        state.health.insert(replacement.id.clone(), health);
        info!(
            instance_id = %replacement.id,
            replaces = %removed.id,
            config = %config,
            "Created replacement instance"
        );
        state.instances.push(replacement);
    }
}
