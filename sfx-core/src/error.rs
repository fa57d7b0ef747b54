//! Error types for explorer operations

use thiserror::Error;

/// Failures raised by the data-access layer while fetching remote records.
///
/// These never reach the renderer: the tree converts them into an errored
/// node carrying the message.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {endpoint} failed: {reason}")]
    Transport { endpoint: String, reason: String },

    #[error("Request to {endpoint} returned status {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Request to {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("Invalid payload from {endpoint}: {reason}")]
    InvalidPayload { endpoint: String, reason: String },

    #[error("Fetch for {node} panicked")]
    Panicked { node: String },

    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Convenience constructor for ad-hoc failures (mostly used by mocks).
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// A required ambient dependency is missing from a tree context.
///
/// This is a programming or configuration error, not a runtime condition.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("Context is missing required field: {field}")]
    Missing { field: &'static str },

    #[error("Context field {field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or SFX_EXPLORER_CONFIG)")]
    MissingConfigPath,

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Master error type for explorer operations.
#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl ExplorerError {
    /// Message shown on an error placeholder node.
    ///
    /// Fetch failures show the collaborator's message without the
    /// "Fetch error:" prefix, everything else uses the full display form.
    pub fn user_message(&self) -> String {
        match self {
            ExplorerError::Fetch(err) => err.to_string(),
            other => other.to_string(),
        }
    }
}

/// Result type alias for explorer operations.
pub type ExplorerResult<T> = Result<T, ExplorerError>;
