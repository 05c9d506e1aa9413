//! Rolling update errors.

use thiserror::Error;

use crate::instance::InstanceId;

/// Result type for rolling update operations.
pub type RolloutResult<T> = Result<T, RolloutError>;

/// Reasons a rolling update stopped before the group fully converged.
#[derive(Debug, Error)]
pub enum RolloutError {
    /// Listing the group failed. Not retried here.
    #[error("failed to list group instances")]
    Snapshot(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// An instance running the target config reported unhealthy.
    #[error("instance {instance} is unhealthy")]
    Unhealthy { instance: InstanceId },

    /// The update was stopped on request.
    #[error("update halted by user")]
    Halted,
}

impl RolloutError {
    /// Returns true if the update was stopped intentionally.
    pub fn is_halted(&self) -> bool {
        matches!(self, Self::Halted)
    }

    /// Returns true if the error indicates a fault worth alerting on.
    pub fn is_fatal(&self) -> bool {
        !self.is_halted()
    }
}

impl From<anyhow::Error> for RolloutError {
    fn from(err: anyhow::Error) -> Self {
        Self::Snapshot(err.into())
    }
}
