//! Integration tests for the rolling update driver.
//!
//! These tests drive full updates against `MemoryGroup`, which replaces each
//! destroyed instance with one on the target config:
//! 1. The driver waits for the target instances to be healthy
//! 2. It destroys one undesired instance
//! 3. The group creates a replacement and the cycle repeats

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fleet_reconcile::{
    classify, ConfigHash, DestroyReason, GroupSettings, Health, InstanceDescription,
    LeaderSelfUpdatePolicy, MemoryGroup, RollingUpdate, RolloutError, Scaled,
};
use tokio::sync::Mutex;

const POLL: Duration = Duration::from_millis(5);

fn tagged(id: &str, hash: &str) -> InstanceDescription {
    InstanceDescription::new(id).with_config_hash(&ConfigHash::new(hash))
}

fn settings(hash: &str, size: usize) -> GroupSettings {
    GroupSettings::new(ConfigHash::new(hash), size)
}

fn destroyed_ids(destroyed: &[(fleet_reconcile::InstanceId, DestroyReason)]) -> Vec<&str> {
    destroyed.iter().map(|(id, _)| id.as_str()).collect()
}

/// Wraps a group and records how many undesired instances existed before and
/// after every destroy.
struct Recording {
    inner: Arc<MemoryGroup>,
    target: GroupSettings,
    undesired_counts: Mutex<Vec<(usize, usize)>>,
}

impl Recording {
    async fn undesired(&self) -> usize {
        let instances = self.inner.instances().await;
        classify(instances, &self.target).undesired.len()
    }
}

#[async_trait]
impl Scaled for Recording {
    async fn list(&self) -> anyhow::Result<Vec<InstanceDescription>> {
        self.inner.list().await
    }

    async fn health(&self, instance: &InstanceDescription) -> Health {
        self.inner.health(instance).await
    }

    async fn destroy(&self, instance: &InstanceDescription, reason: DestroyReason) {
        let before = self.undesired().await;
        self.inner.destroy(instance, reason).await;
        let after = self.undesired().await;
        self.undesired_counts.lock().await.push((before, after));
    }
}

#[tokio::test]
async fn test_replaces_every_old_instance() {
    let h0 = ConfigHash::new("h0");
    let h1 = ConfigHash::new("h1");
    let group = Arc::new(
        MemoryGroup::new(vec![tagged("c", "h0"), tagged("a", "h0"), tagged("b", "h0")])
            .with_replacement(h1.clone()),
    );
    let update = RollingUpdate::new("h0 -> h1", group.clone(), settings("h0", 3), settings("h1", 3));

    update.run(POLL).await.unwrap();

    let destroyed = group.destroyed().await;
    assert_eq!(destroyed_ids(&destroyed), vec!["a", "b", "c"]);
    assert!(destroyed
        .iter()
        .all(|(_, reason)| *reason == DestroyReason::RollingUpdate));
    assert_eq!(group.count_with_config(&h0).await, 0);
    assert_eq!(group.count_with_config(&h1).await, 3);
}

#[tokio::test]
async fn test_destroys_one_at_a_time() {
    let h1 = ConfigHash::new("h1");
    let group = Arc::new(
        MemoryGroup::new(vec![
            tagged("a", "h0"),
            tagged("b", "h0"),
            tagged("c", "h0"),
            tagged("d", "h0"),
        ])
        .with_replacement(h1),
    );
    let recording = Arc::new(Recording {
        inner: group.clone(),
        target: settings("h1", 4),
        undesired_counts: Mutex::new(Vec::new()),
    });
    let update = RollingUpdate::new("h0 -> h1", recording.clone(), settings("h0", 4), settings("h1", 4));

    update.run(POLL).await.unwrap();

    let counts = recording.undesired_counts.lock().await.clone();
    assert_eq!(counts, vec![(4, 3), (3, 2), (2, 1), (1, 0)]);
}

#[tokio::test]
async fn test_nothing_to_do() {
    let group = Arc::new(MemoryGroup::new(vec![tagged("a", "h1"), tagged("b", "h1")]));
    let update = RollingUpdate::new("noop", group.clone(), settings("h0", 2), settings("h1", 2));

    update.run(POLL).await.unwrap();

    assert!(group.destroyed().await.is_empty());
}

#[tokio::test]
async fn test_protected_self_is_never_destroyed() {
    let to = settings("h1", 1)
        .with_self("mgr-0")
        .with_policy(LeaderSelfUpdatePolicy::Never);
    let from = settings("h0", 1)
        .with_self("mgr-0")
        .with_policy(LeaderSelfUpdatePolicy::Never);
    let group = Arc::new(
        MemoryGroup::new(vec![tagged("a", "h0").with_logical_id("mgr-0")])
            .with_replacement(ConfigHash::new("h1")),
    );
    let update = RollingUpdate::new("self", group.clone(), from, to);

    update.run(POLL).await.unwrap();

    assert!(group.destroyed().await.is_empty());
    assert_eq!(group.instances().await[0].id.as_str(), "a");
}

#[tokio::test]
async fn test_self_is_replaced_last() {
    let from = settings("h0", 3).with_self("mgr-0");
    let to = settings("h1", 3).with_self("mgr-0");
    let group = Arc::new(
        MemoryGroup::new(vec![
            tagged("a", "h0").with_logical_id("mgr-0"),
            tagged("b", "h0").with_logical_id("mgr-1"),
            tagged("c", "h0").with_logical_id("mgr-2"),
        ])
        .with_replacement(ConfigHash::new("h1")),
    );
    let update = RollingUpdate::new("self last", group.clone(), from, to);

    update.run(POLL).await.unwrap();

    let destroyed = group.destroyed().await;
    assert_eq!(destroyed_ids(&destroyed), vec!["b", "c", "a"]);
}

#[tokio::test]
async fn test_waits_for_replacement_health() {
    let h1 = ConfigHash::new("h1");
    let group = Arc::new(
        MemoryGroup::new(vec![tagged("a", "h0"), tagged("b", "h0")])
            .with_replacement(h1.clone())
            .with_replacement_health(Health::Unknown),
    );
    let update = Arc::new(RollingUpdate::new(
        "h0 -> h1",
        group.clone(),
        settings("h0", 2),
        settings("h1", 2),
    ));

    let handle = tokio::spawn({
        let update = update.clone();
        async move { update.run(POLL).await }
    });

    // First destroy needs no healthy replacements; the second one must wait
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(group.destroyed().await.len(), 1);
    assert!(!handle.is_finished());

    group.set_health_for_config(&h1, Health::Healthy).await;

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(group.destroyed().await.len(), 2);
    assert_eq!(group.count_with_config(&h1).await, 2);
}

#[tokio::test]
async fn test_unhealthy_replacement_aborts() {
    let group = Arc::new(
        MemoryGroup::new(vec![tagged("a", "h0"), tagged("b", "h0"), tagged("c", "h0")])
            .with_replacement(ConfigHash::new("h1"))
            .with_replacement_health(Health::Unhealthy),
    );
    let update = RollingUpdate::new("h0 -> h1", group.clone(), settings("h0", 3), settings("h1", 3));

    let err = update.run(POLL).await.unwrap_err();

    match err {
        RolloutError::Unhealthy { instance } => assert_eq!(instance.as_str(), "replacement-0000"),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(group.destroyed().await.len(), 1);
}

#[tokio::test]
async fn test_stop_halts_without_further_destroys() {
    let group = Arc::new(
        MemoryGroup::new(vec![tagged("a", "h0"), tagged("b", "h0"), tagged("c", "h0")])
            .with_replacement(ConfigHash::new("h1"))
            .with_replacement_health(Health::Unknown),
    );
    let update = Arc::new(RollingUpdate::new(
        "h0 -> h1",
        group.clone(),
        settings("h0", 3),
        settings("h1", 3),
    ));

    let handle = tokio::spawn({
        let update = update.clone();
        async move { update.run(POLL).await }
    });

    tokio::time::sleep(Duration::from_millis(40)).await;
    update.stop();

    let err = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap_err();
    assert!(err.is_halted());
    assert_eq!(group.destroyed().await.len(), 1);

    // Nothing happens after the halt
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(group.destroyed().await.len(), 1);
}

#[tokio::test]
async fn test_list_failure_aborts_run() {
    let group = Arc::new(MemoryGroup::new(vec![tagged("a", "h0")]));
    group.fail_list(true);
    let update = RollingUpdate::new("h0 -> h1", group.clone(), settings("h0", 1), settings("h1", 1));

    let err = update.run(POLL).await.unwrap_err();

    assert!(matches!(err, RolloutError::Snapshot(_)));
    assert!(err.is_fatal());
    assert_eq!(group.list_calls(), 1);
    assert!(group.destroyed().await.is_empty());
}

#[tokio::test]
async fn test_excess_desired_instances_are_capped() {
    // Four instances already on the target config but the target size is
    // two: the first wait must not demand four healthy instances.
    let h1 = ConfigHash::new("h1");
    let group = Arc::new(
        MemoryGroup::new(vec![
            tagged("a", "h1"),
            tagged("b", "h1"),
            tagged("c", "h1"),
            tagged("d", "h1"),
            tagged("e", "h0"),
        ])
        .with_replacement(h1.clone()),
    );
    group.set_health("c", Health::Unknown).await;
    group.set_health("d", Health::Unknown).await;
    let update = RollingUpdate::new("h0 -> h1", group.clone(), settings("h0", 2), settings("h1", 2));

    tokio::time::timeout(Duration::from_secs(5), update.run(POLL))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(destroyed_ids(&group.destroyed().await), vec!["e"]);
}
