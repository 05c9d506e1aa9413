//! The group capability a rolling update drives.

use anyhow::Result;
use async_trait::async_trait;

use crate::instance::{DestroyReason, Health, InstanceDescription};

/// A scaled group of instances.
///
/// Implemented by production backends over instance and flavor plugins, and
/// by [`MemoryGroup`](crate::MemoryGroup) for tests.
#[async_trait]
pub trait Scaled: Send + Sync {
    /// List the current members of the group.
    async fn list(&self) -> Result<Vec<InstanceDescription>>;

    /// Evaluate the health of one instance.
    ///
    /// No timeout is applied by callers; implementations must bound their
    /// own calls.
    async fn health(&self, instance: &InstanceDescription) -> Health;

    /// Remove an instance from the group.
    ///
    /// Fire-and-forget: completion and retries belong to the implementation.
    async fn destroy(&self, instance: &InstanceDescription, reason: DestroyReason);
}
