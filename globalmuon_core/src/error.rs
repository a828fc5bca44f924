//! Error types for the reconstruction engines.
//!
//! Expected "no result" outcomes (no crossing, nothing in the region, no
//! compatible tracker track, a refit that did not converge) are not errors;
//! they show up as empty collections or absent slots. Only malformed input
//! aborts the processing of a single outer track.

use globalmuon_env::TrackId;

/// Errors that abort the processing of one outer track.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ReconstructionError {
    #[error("Track {0} has no valid hits")]
    EmptyTrack(TrackId),

    #[error("Track {0} has non-finite momentum")]
    InvalidMomentum(TrackId),
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
