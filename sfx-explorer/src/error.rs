//! Error types for the explorer binary.

use sfx_client::ClientError;
use sfx_core::{ConfigError, ExplorerError};

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Explorer(#[from] ExplorerError),
}
