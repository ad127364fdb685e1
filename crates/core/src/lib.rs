// Surge Core - Elastic producer/consumer containers
// NO infrastructure dependencies (Hexagonal Architecture)

pub mod application;
pub mod domain;
pub mod error;
pub mod port;
pub mod settings;

pub use application::{new_container, ConsumeFn, Container, ContainerConfig, ContainerKind};
pub use domain::{Envelope, Message, WorkerCounts};
pub use error::{AppError, Result};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
