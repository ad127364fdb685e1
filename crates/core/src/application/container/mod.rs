// Containers - elastic producer/consumer engines
//
// A container owns a queue and a pool of workers draining it:
//   - `consume()` starts one permanent worker (blocking dequeue, forever)
//   - `produce()` enqueues, or on backpressure hands the message to a freshly
//     spawned transient worker that drains until the queue looks empty
//
// Two backends share the same worker supervision and counters:
//   - ChannelContainer: in-process bounded buffer
//   - CacheContainer: external list store (Redis-like) via ListBackend

mod base;
mod buffer;
mod cache;
mod channel;

pub use base::ContainerBase;
pub use buffer::BoundedBuffer;
pub use cache::{CacheContainer, CacheParts};
pub use channel::ChannelContainer;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::application::factory::ContainerKind;
use crate::application::restart::RestartPolicy;
use crate::domain::{Message, WorkerCounts, WorkerLifecycle};
use crate::error::Result;
use crate::port::RecordHook;

/// Consumer callback, invoked once per valid dequeued message
pub type ConsumeFn<M> = Arc<dyn Fn(M) + Send + Sync>;

/// Tuning shared by both container variants
#[derive(Clone, Default)]
pub struct WorkerOptions {
    /// Channel: transient idle keep-alive. Cache: blocking-pop read timeout.
    /// Zero selects the variant's default.
    pub keep_alive: Duration,
    /// Consecutive dequeues before a transient worker yields (0 = default)
    pub yield_every: u32,
    /// Permanent worker restart budget (`None` = unbounded)
    pub max_restarts: Option<u64>,
    pub record: Option<RecordHook>,
}

impl WorkerOptions {
    fn keep_alive_or(&self, default: Duration) -> Duration {
        if self.keep_alive.is_zero() {
            default
        } else {
            self.keep_alive
        }
    }

    fn yield_every_or(&self, default: u32) -> u32 {
        if self.yield_every == 0 {
            default
        } else {
            self.yield_every
        }
    }

    fn into_base(self) -> ContainerBase {
        ContainerBase::new(self.record, RestartPolicy::new(self.max_restarts))
    }
}

/// Producer/consumer container
#[async_trait]
pub trait Container<M: Message>: Send + Sync {
    /// Enqueue `msg`, or start a transient worker for it when the queue is
    /// under backpressure. Never waits for a worker to finish.
    async fn produce(&self, msg: M) -> Result<()>;

    /// Start one more permanent worker and return immediately
    async fn consume(&self) -> Result<()>;

    /// Active (permanent, transient) worker counts
    fn worker_counts(&self) -> WorkerCounts;

    /// Lifecycles of workers that have not exited
    fn workers(&self) -> Vec<WorkerLifecycle>;

    /// Permanent worker restarts granted so far
    fn restarts(&self) -> u64;

    fn kind(&self) -> ContainerKind;
}
