// Application Layer - Containers, worker supervision and construction

pub mod container;
pub mod factory;
pub mod restart;
pub mod worker;

// Re-exports
pub use container::{CacheContainer, ChannelContainer, ConsumeFn, Container, WorkerOptions};
pub use factory::{new_container, ContainerConfig, ContainerKind};
pub use restart::{RestartDecision, RestartPolicy};
