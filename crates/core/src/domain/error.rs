// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid worker state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Message id must not be empty")]
    EmptyMessageId,

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
