//! Top-level error type for startup and serving.

use thiserror::Error;

use crate::config::ConfigError;
use crate::upstream::ClientBuildError;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Client(#[from] ClientBuildError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
