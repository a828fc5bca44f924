//! Errors of the simulation front end.

use globalmuon_core::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to write export: {0}")]
    Export(#[from] std::io::Error),

    #[error("{0}")]
    InvalidArgument(String),
}
