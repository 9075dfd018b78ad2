use thiserror::Error;

/// Top-level error type for the Vens system.
///
/// Subsystem crates define their own error types and implement
/// `From<SubsystemError> for VensError` so that `?` works across crate
/// boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VensError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Scheduling error: {0}")]
    Scheduling(String),

    #[error("Notifier error: {0}")]
    Notifier(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Shutdown in progress")]
    ShuttingDown,
}

impl From<toml::de::Error> for VensError {
    fn from(err: toml::de::Error) -> Self {
        VensError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for VensError {
    fn from(err: toml::ser::Error) -> Self {
        VensError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for VensError {
    fn from(err: serde_json::Error) -> Self {
        VensError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Vens operations.
pub type Result<T> = std::result::Result<T, VensError>;
