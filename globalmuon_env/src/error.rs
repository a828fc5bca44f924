//! Error types for the detector environment abstraction.

use thiserror::Error;

/// Errors raised while building event data objects.
#[derive(Debug, Clone, Error)]
pub enum EnvError {
    /// State parameters or covariance are unusable
    #[error("Invalid track state: {0}")]
    InvalidState(String),

    /// Trajectory built without any measurement
    #[error("Trajectory has no measurements")]
    EmptyTrajectory,
}

impl EnvError {
    /// Creates an invalid-state error.
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}
