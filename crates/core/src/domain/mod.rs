// Domain Layer - Message contract and worker lifecycle

pub mod error;
pub mod message;
pub mod worker;

// Re-exports
pub use error::DomainError;
pub use message::{is_deliverable, Envelope, Message, MessageId};
pub use worker::{WorkerCounts, WorkerKind, WorkerLifecycle, WorkerState};
