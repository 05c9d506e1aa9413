//! Group reconciliation and rolling updates.
//!
//! This library migrates a group of instances from one configuration to
//! another while holding its size constant. Key concepts:
//!
//! - **Config hash**: a content hash of the instance spec, tagged onto every
//!   instance so its generation can be recognized.
//! - **Desired / undesired**: instances matching the target hash (or
//!   protected as the controller's own node) versus replacement candidates.
//! - **Quiescence**: enough healthy instances on the target config to safely
//!   destroy the next undesired one.
//!
//! # Invariants
//!
//! - Classification partitions a snapshot exactly and preserves its order
//! - Destroy order is deterministic given the same inputs
//! - At most one instance is destroyed per quiescence cycle
//! - The controller never destroys itself under the `never` policy
//!
//! The group itself is reached through the [`Scaled`] trait; this crate only
//! reads snapshots and health and issues single-instance destroys.

use std::time::Duration;

mod classify;
pub mod config;
mod error;
mod hash;
mod instance;
mod memory;
mod rolling;
mod scaled;
mod settings;

pub use classify::{classify, destroy_order, is_desired, is_protected, is_self, Classification};
pub use config::RolloutConfig;
pub use error::{RolloutError, RolloutResult};
pub use hash::ConfigHash;
pub use instance::{
    DestroyReason, Health, InstanceDescription, InstanceId, LogicalId, Tags, CONFIG_HASH_TAG,
    LOGICAL_ID_TAG,
};
pub use memory::MemoryGroup;
pub use rolling::RollingUpdate;
pub use scaled::Scaled;
pub use settings::{GroupSettings, InvalidPolicy, LeaderSelfUpdatePolicy};

/// Default interval between quiescence polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
