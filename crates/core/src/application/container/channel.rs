// In-process container backed by a bounded buffer

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{BoundedBuffer, ConsumeFn, Container, ContainerBase, WorkerOptions};
use crate::application::factory::ContainerKind;
use crate::application::worker::constants::{
    DEFAULT_IDLE_KEEP_ALIVE, DEFAULT_YIELD_EVERY, MIN_CHANNEL_CAPACITY,
};
use crate::application::worker::{deliver, spawn_permanent, spawn_transient, WorkerBody};
use crate::domain::{Message, WorkerCounts, WorkerLifecycle, WorkerState};
use crate::error::{AppError, Result};

/// Container whose queue is an in-process bounded FIFO.
///
/// `produce` never blocks: a full buffer sends the message to a new transient
/// worker instead. Transient workers exit on the first empty poll.
pub struct ChannelContainer<M: Message> {
    workers: Arc<ChannelWorkers<M>>,
}

struct ChannelWorkers<M: Message> {
    base: ContainerBase,
    buffer: BoundedBuffer<M>,
    consumer: ConsumeFn<M>,
    idle_keep_alive: Duration,
    yield_every: u32,
}

impl<M: Message> ChannelContainer<M> {
    /// Create a container with default tuning
    ///
    /// # Errors
    /// - `AppError::InvalidCapacity` if `capacity < 1`
    pub fn new(capacity: i64, consumer: ConsumeFn<M>) -> Result<Self> {
        Self::with_options(capacity, consumer, WorkerOptions::default())
    }

    pub fn with_options(
        capacity: i64,
        consumer: ConsumeFn<M>,
        options: WorkerOptions,
    ) -> Result<Self> {
        if capacity < MIN_CHANNEL_CAPACITY {
            return Err(AppError::InvalidCapacity {
                got: capacity,
                min: MIN_CHANNEL_CAPACITY,
            });
        }
        let too_large = || AppError::Config(format!("capacity {} does not fit in memory", capacity));
        let buffer = usize::try_from(capacity)
            .map_err(|_| too_large())
            .and_then(|c| BoundedBuffer::try_new(c).map_err(|_| too_large()))?;

        let idle_keep_alive = options.keep_alive_or(DEFAULT_IDLE_KEEP_ALIVE);
        let yield_every = options.yield_every_or(DEFAULT_YIELD_EVERY);

        Ok(Self {
            workers: Arc::new(ChannelWorkers {
                base: options.into_base(),
                buffer,
                consumer,
                idle_keep_alive,
                yield_every,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.workers.buffer.capacity()
    }

    /// Messages currently buffered
    pub fn len(&self) -> usize {
        self.workers.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.buffer.is_empty()
    }

    /// Configured keep-alive. In-process transient workers exit on emptiness,
    /// so this only bounds how long one may linger after the buffer drains.
    pub fn idle_keep_alive(&self) -> Duration {
        self.workers.idle_keep_alive
    }

    pub fn yield_every(&self) -> u32 {
        self.workers.yield_every
    }
}

#[async_trait]
impl<M: Message> Container<M> for ChannelContainer<M> {
    async fn produce(&self, msg: M) -> Result<()> {
        if let Err(msg) = self.workers.buffer.try_push(msg) {
            spawn_transient(&self.workers, Some(msg));
        }
        Ok(())
    }

    async fn consume(&self) -> Result<()> {
        spawn_permanent(&self.workers);
        Ok(())
    }

    fn worker_counts(&self) -> WorkerCounts {
        self.workers.base.counts()
    }

    fn workers(&self) -> Vec<WorkerLifecycle> {
        self.workers.base.live_workers()
    }

    fn restarts(&self) -> u64 {
        self.workers.base.restart_policy().restarts()
    }

    fn kind(&self) -> ContainerKind {
        ContainerKind::Channel
    }
}

#[async_trait]
impl<M: Message> WorkerBody for ChannelWorkers<M> {
    type Msg = M;

    fn base(&self) -> &ContainerBase {
        &self.base
    }

    async fn run_permanent(self: Arc<Self>, _lifecycle: WorkerLifecycle) {
        loop {
            let msg = self.buffer.pop().await;
            deliver(&self.consumer, msg).await;
        }
    }

    async fn run_transient(self: Arc<Self>, seed: Option<M>, lifecycle: WorkerLifecycle) {
        if let Some(msg) = seed {
            deliver(&self.consumer, msg).await;
        }

        let mut streak = 0u32;
        while let Some(msg) = self.buffer.try_pop() {
            deliver(&self.consumer, msg).await;
            streak += 1;
            if streak >= self.yield_every {
                streak = 0;
                // Leave room for the permanent worker
                tokio::task::yield_now().await;
            }
        }

        let _ = lifecycle.transition(WorkerState::Draining);
        debug!(worker_id = %lifecycle.id(), "Buffer empty, transient worker leaving");
    }
}
