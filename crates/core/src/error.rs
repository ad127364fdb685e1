// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Construction failures each get their own variant so callers can match on
/// exactly what was misconfigured.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Consumer callback must be provided")]
    MissingConsumer,

    #[error("Invalid queue capacity {got}: must be at least {min}")]
    InvalidCapacity { got: i64, min: i64 },

    #[error("List backend must be provided for a cache container")]
    MissingBackend,

    #[error("Marshal function must be provided for a cache container")]
    MissingMarshal,

    #[error("Unmarshal function must be provided for a cache container")]
    MissingUnmarshal,

    #[error("Unknown container kind: {0:?}")]
    UnknownContainerKind(String),

    #[error("Marshal error: {0}")]
    Marshal(#[from] crate::port::CodecError),

    #[error("Backend error: {0}")]
    Backend(#[from] crate::port::BackendError),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}
