//! Rollout simulator
//!
//! Builds an in-memory group running one image and rolls it to another,
//! logging every step. Useful for watching the update pacing and the
//! self-protection policy without real instance backends.

mod config;

use std::sync::Arc;

use anyhow::Result;
use fleet_reconcile::{
    GroupSettings, InstanceDescription, MemoryGroup, RollingUpdate, RolloutConfig,
};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::SimConfig;

#[tokio::main]
async fn main() -> Result<()> {
    let config = SimConfig::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to FLEET_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let rollout = RolloutConfig::from_env()?;
    info!(
        group_size = config.group_size,
        poll_interval_ms = rollout.poll_interval.as_millis() as u64,
        self_id = ?rollout.self_id,
        policy = %rollout.policy,
        "Configuration loaded"
    );

    let from = rollout.apply(GroupSettings::from_spec(
        &serde_json::json!({ "image": config.from_image }),
        config.group_size,
    ));
    let to = rollout.apply(GroupSettings::from_spec(
        &serde_json::json!({ "image": config.to_image }),
        config.group_size,
    ));

    let instances = (0..config.group_size)
        .map(|n| {
            InstanceDescription::new(format!("inst-{n:03}"))
                .with_logical_id(format!("slot-{n}"))
                .with_config_hash(&from.config)
        })
        .collect();
    let group = Arc::new(
        MemoryGroup::new(instances)
            .with_replacement(to.config.clone())
            .with_replacement_health(config.replacement_health),
    );

    let description = format!("{} -> {}", config.from_image, config.to_image);
    let update = Arc::new(RollingUpdate::new(description, group.clone(), from, to));

    let mut run = tokio::spawn({
        let update = update.clone();
        let poll_interval = rollout.poll_interval;
        async move { update.run(poll_interval).await }
    });

    let result = tokio::select! {
        joined = &mut run => joined?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
            update.stop();
            run.await?
        }
    };

    let destroyed = group.destroyed().await.len();
    match result {
        Ok(()) => {
            info!(destroyed, "Update finished");
            Ok(())
        }
        Err(e) if e.is_halted() => {
            info!(destroyed, "Update stopped before completion");
            Ok(())
        }
        Err(e) => {
            error!(destroyed, error = %e, "Update failed");
            Err(e.into())
        }
    }
}
