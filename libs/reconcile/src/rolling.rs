//! Rolling update driver.
//!
//! A [`RollingUpdate`] migrates a group from one configuration to another
//! while holding its size constant. It alternates between two states:
//!
//! ```text
//!            ┌──────────────────────────────┐
//!            ▼                              │
//!   Waiting (quiescence poll) ──► Destroying (one undesired instance)
//!            │
//!            └──► done when no undesired instances remain
//! ```
//!
//! At most one unit of capacity is removed before its replacement is
//! confirmed healthy. Cancellation is cooperative and only observed between
//! poll ticks, so a destroy that has already been decided always completes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, destroy_order};
use crate::error::{RolloutError, RolloutResult};
use crate::instance::{DestroyReason, Health, InstanceDescription};
use crate::scaled::Scaled;
use crate::settings::GroupSettings;

/// An in-flight transition of a group between two configurations.
pub struct RollingUpdate<S: Scaled> {
    description: String,
    scaled: Arc<S>,
    updating_from: GroupSettings,
    updating_to: GroupSettings,
    stop: watch::Sender<bool>,
}

impl<S: Scaled> RollingUpdate<S> {
    /// Create a new rolling update. Nothing happens until [`run`](Self::run).
    pub fn new(
        description: impl Into<String>,
        scaled: Arc<S>,
        updating_from: GroupSettings,
        updating_to: GroupSettings,
    ) -> Self {
        let (stop, _) = watch::channel(false);

        Self {
            description: description.into(),
            scaled,
            updating_from,
            updating_to,
            stop,
        }
    }

    /// Human-readable description of the transition.
    pub fn explain(&self) -> &str {
        &self.description
    }

    pub fn updating_from(&self) -> &GroupSettings {
        &self.updating_from
    }

    pub fn updating_to(&self) -> &GroupSettings {
        &self.updating_to
    }

    /// Request the update to stop.
    ///
    /// A running [`run`](Self::run) observes this on its next poll tick and
    /// returns [`RolloutError::Halted`]. Calling this more than once is a no-op.
    pub fn stop(&self) {
        if !self.stop.send_replace(true) {
            info!(update = %self.description, "Stop requested");
        }
    }

    /// Returns true once [`stop`](Self::stop) has been called.
    pub fn is_stopped(&self) -> bool {
        *self.stop.borrow()
    }

    /// Destroy undesired instances one at a time until every instance in the
    /// group matches the target configuration.
    ///
    /// There is no overall timeout; wrap the call in one if needed.
    #[instrument(skip(self), fields(update = %self.description, target = %self.updating_to.config))]
    pub async fn run(&self, poll_interval: Duration) -> RolloutResult<()> {
        let instances = self.scaled.list().await?;
        let mut expected_new_instances = classify(instances, &self.updating_to).desired.len();

        info!(
            expected_new_instances,
            allocation_size = self.updating_to.allocation_size,
            "Starting rolling update"
        );

        loop {
            // Never wait for more healthy instances than the target size calls for
            let required = expected_new_instances.min(self.updating_to.allocation_size);
            self.wait_until_quiesced(poll_interval, required).await?;
            info!(required, "Group has quiesced");

            let instances = self.scaled.list().await?;
            let mut undesired = classify(instances, &self.updating_to).undesired;
            destroy_order(&mut undesired, &self.updating_from);

            let Some(victim) = undesired.first() else {
                break;
            };

            info!(
                undesired = undesired.len(),
                instance_id = %victim.id,
                reason = %DestroyReason::RollingUpdate,
                "Destroying undesired instance"
            );
            self.scaled
                .destroy(victim, DestroyReason::RollingUpdate)
                .await;

            expected_new_instances += 1;
        }

        info!("Rolling update complete");
        Ok(())
    }

    /// Block until `expected_new_instances` instances running the target
    /// configuration report healthy.
    ///
    /// Instances not on the target configuration are ignored, so a group that
    /// was already unhealthy before the update does not block it. A single
    /// unhealthy target instance fails the wait immediately, even if enough
    /// others are healthy. Unknown health neither counts nor fails, and the
    /// wait continues until an operator intervenes.
    pub async fn wait_until_quiesced(
        &self,
        poll_interval: Duration,
        expected_new_instances: usize,
    ) -> RolloutResult<()> {
        let mut stop = self.stop.subscribe();
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // First tick completes immediately; polling starts one interval from now
        ticker.tick().await;

        loop {
            tokio::select! {
                biased;

                _ = stop_requested(&mut stop) => {
                    warn!(update = %self.description, "Update halted by user");
                    return Err(RolloutError::Halted);
                }
                _ = ticker.tick() => {
                    let instances = self.scaled.list().await?;
                    let matching = classify(instances, &self.updating_to).desired;

                    let counts = self.health_counts(&matching).await?;
                    if counts.healthy >= expected_new_instances {
                        return Ok(());
                    }

                    if counts.unknown > 0 {
                        info!(
                            healthy = counts.healthy,
                            unknown = counts.unknown,
                            expected = expected_new_instances,
                            "Waiting for group to quiesce; some instances report unknown health"
                        );
                    } else {
                        info!(
                            healthy = counts.healthy,
                            expected = expected_new_instances,
                            "Waiting for group to quiesce"
                        );
                    }
                }
            }
        }
    }

    async fn health_counts(&self, matching: &[InstanceDescription]) -> RolloutResult<HealthCounts> {
        let mut counts = HealthCounts::default();

        for instance in matching {
            match self.scaled.health(instance).await {
                Health::Healthy => counts.healthy += 1,
                Health::Unhealthy => {
                    warn!(instance_id = %instance.id, "Instance is unhealthy, aborting update");
                    return Err(RolloutError::Unhealthy {
                        instance: instance.id.clone(),
                    });
                }
                Health::Unknown => {
                    debug!(instance_id = %instance.id, "Instance health is unknown");
                    counts.unknown += 1;
                }
            }
        }

        Ok(counts)
    }
}

/// Resolves once a stop has been requested.
async fn stop_requested(stop: &mut watch::Receiver<bool>) {
    // The sender lives as long as the update itself
    let _ = stop.wait_for(|stopped| *stopped).await;
}

#[derive(Debug, Default)]
struct HealthCounts {
    healthy: usize,
    unknown: usize,
}
