// Container backed by an external list store (Redis-like)

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{ConsumeFn, Container, ContainerBase, WorkerOptions};
use crate::application::factory::ContainerKind;
use crate::application::worker::constants::{
    CACHE_KEY_PREFIX, DEFAULT_READ_TIMEOUT, ERROR_RECOVERY_SLEEP_DURATION, MIN_CACHE_MSG_LEN,
};
use crate::application::worker::{deliver, spawn_permanent, spawn_transient, WorkerBody};
use crate::domain::{Message, WorkerCounts, WorkerLifecycle, WorkerState};
use crate::error::{AppError, Result};
use crate::port::{ListBackend, MarshalFn, RecordTag, TimeProvider, UnmarshalFn};

/// Container whose queue is a list in an external store.
///
/// Messages cross the store as bytes produced by the marshal function. When a
/// length threshold is set and the store already holds that many items,
/// `produce` skips the push and gives the message to a transient worker.
/// Workers wait on `blocking_pop` with the read timeout; for a transient
/// worker an empty pop means the queue is drained and it exits.
pub struct CacheContainer<M: Message> {
    workers: Arc<CacheWorkers<M>>,
}

struct CacheWorkers<M: Message> {
    base: ContainerBase,
    backend: Arc<dyn ListBackend>,
    consumer: ConsumeFn<M>,
    marshal: MarshalFn<M>,
    unmarshal: UnmarshalFn<M>,
    queue_key: String,
    read_timeout: Duration,
    msg_len: i64,
}

/// Everything a cache container needs besides tuning
pub struct CacheParts<M: Message> {
    pub backend: Arc<dyn ListBackend>,
    pub consumer: ConsumeFn<M>,
    pub marshal: MarshalFn<M>,
    pub unmarshal: UnmarshalFn<M>,
}

impl<M: Message> CacheContainer<M> {
    /// Create a container
    ///
    /// # Arguments
    /// * `parts` - Backend, consumer and codec
    /// * `msg_len` - Length threshold that triggers transient workers (0 = never)
    /// * `queue_key` - List key; generated from the clock when `None`
    /// * `time_provider` - Clock used for the generated key
    /// * `options` - Read timeout, restart budget, record hook
    ///
    /// # Errors
    /// - `AppError::InvalidCapacity` if `msg_len < 0`
    pub fn new(
        parts: CacheParts<M>,
        msg_len: i64,
        queue_key: Option<String>,
        time_provider: &dyn TimeProvider,
        options: WorkerOptions,
    ) -> Result<Self> {
        if msg_len < MIN_CACHE_MSG_LEN {
            return Err(AppError::InvalidCapacity {
                got: msg_len,
                min: MIN_CACHE_MSG_LEN,
            });
        }

        let queue_key = queue_key
            .filter(|k| !k.is_empty())
            .unwrap_or_else(|| format!("{}{}", CACHE_KEY_PREFIX, time_provider.now_nanos()));
        let read_timeout = options.keep_alive_or(DEFAULT_READ_TIMEOUT);

        info!(queue_key = %queue_key, msg_len = %msg_len, read_timeout = ?read_timeout, "Cache container created");

        Ok(Self {
            workers: Arc::new(CacheWorkers {
                base: options.into_base(),
                backend: parts.backend,
                consumer: parts.consumer,
                marshal: parts.marshal,
                unmarshal: parts.unmarshal,
                queue_key,
                read_timeout,
                msg_len,
            }),
        })
    }

    /// Key of the external list this container reads and writes
    pub fn queue_key(&self) -> &str {
        &self.workers.queue_key
    }

    pub fn read_timeout(&self) -> Duration {
        self.workers.read_timeout
    }

    /// Length threshold (0 = unbounded)
    pub fn msg_len(&self) -> i64 {
        self.workers.msg_len
    }
}

#[async_trait]
impl<M: Message> Container<M> for CacheContainer<M> {
    async fn produce(&self, msg: M) -> Result<()> {
        let w = &self.workers;

        if w.msg_len > 0 {
            match w.backend.length(&w.queue_key).await {
                Ok(len) if len >= w.msg_len => {
                    debug!(queue_key = %w.queue_key, length = %len, "Queue over threshold, bypassing push");
                    spawn_transient(&self.workers, Some(msg));
                    return Ok(());
                }
                Ok(_) => {}
                // Length is advisory; fall through to the push
                Err(e) => w.base.record(RecordTag::Error, e),
            }
        }

        let payload = (w.marshal)(&msg)?;
        w.backend.push(&w.queue_key, payload).await?;
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
        ContainerKind::Cache
    }
}

impl<M: Message> CacheWorkers<M> {
    /// Decode and deliver one popped payload; undecodable payloads are dropped
    async fn handle(&self, payload: &[u8]) {
        match (self.unmarshal)(payload) {
            Ok(msg) => {
                deliver(&self.consumer, msg).await;
            }
            Err(e) => self.base.record(RecordTag::Error, e),
        }
    }
}

#[async_trait]
impl<M: Message> WorkerBody for CacheWorkers<M> {
    type Msg = M;

    fn base(&self) -> &ContainerBase {
        &self.base
    }

    async fn run_permanent(self: Arc<Self>, lifecycle: WorkerLifecycle) {
        loop {
            match self.backend.blocking_pop(&self.queue_key, self.read_timeout).await {
                Ok(Some(payload)) => {
                    let _ = lifecycle.transition(WorkerState::Running);
                    self.handle(&payload).await;
                }
                Ok(None) => {
                    let _ = lifecycle.transition(WorkerState::Draining);
                    self.base.record(RecordTag::Debug, "blocking pop timed out");
                }
                Err(e) => {
                    let _ = lifecycle.transition(WorkerState::Draining);
                    self.base.record(RecordTag::Error, &e);
                    tokio::time::sleep(ERROR_RECOVERY_SLEEP_DURATION).await;
                }
            }
        }
    }

    async fn run_transient(self: Arc<Self>, seed: Option<M>, lifecycle: WorkerLifecycle) {
        if let Some(msg) = seed {
            deliver(&self.consumer, msg).await;
        }

        loop {
            match self.backend.blocking_pop(&self.queue_key, self.read_timeout).await {
                Ok(Some(payload)) => self.handle(&payload).await,
                Ok(None) => {
                    self.base.record(RecordTag::Debug, "blocking pop timed out, queue drained");
                    break;
                }
                Err(e) => {
                    self.base.record(RecordTag::Error, &e);
                    break;
                }
            }
        }

        let _ = lifecycle.transition(WorkerState::Draining);
        debug!(worker_id = %lifecycle.id(), "Transient worker leaving");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Envelope;
    use crate::port::list_backend::mocks::InMemoryListBackend;
    use crate::port::record::mocks::RecordCollector;
    use crate::port::time_provider::FixedTimeProvider;
    use crate::port::{json_marshal, json_unmarshal, CodecError};
    use std::sync::Mutex;
    use tokio::time::{sleep, Instant};

    const FAST: Duration = Duration::from_millis(50);

    struct Harness {
        backend: Arc<InMemoryListBackend>,
        seen: Arc<Mutex<Vec<String>>>,
        records: RecordCollector,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                backend: Arc::new(InMemoryListBackend::new()),
                seen: Arc::new(Mutex::new(Vec::new())),
                records: RecordCollector::new(),
            }
        }

        fn parts(&self) -> CacheParts<Envelope> {
            let seen = Arc::clone(&self.seen);
            CacheParts {
                backend: self.backend.clone(),
                consumer: Arc::new(move |m: Envelope| seen.lock().unwrap().push(m.id)),
                marshal: json_marshal(),
                unmarshal: json_unmarshal(),
            }
        }

        fn container(&self, msg_len: i64) -> CacheContainer<Envelope> {
            let options = WorkerOptions {
                keep_alive: FAST,
                record: Some(self.records.hook()),
                ..WorkerOptions::default()
            };
            CacheContainer::new(self.parts(), msg_len, None, &FixedTimeProvider(42), options)
                .unwrap()
        }

        fn seen(&self) -> Vec<String> {
            self.seen.lock().unwrap().clone()
        }
    }

    async fn eventually(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            sleep(Duration::from_millis(5)).await;
        }
        cond()
    }

    fn msg(id: &str) -> Envelope {
        Envelope::bare(id).unwrap()
    }

    #[test]
    fn test_key_and_defaults() {
        let h = Harness::new();
        let container = CacheContainer::new(
            h.parts(),
            0,
            None,
            &FixedTimeProvider(1_700_000_000_123_456_789),
            WorkerOptions::default(),
        )
        .unwrap();
        assert_eq!(container.queue_key(), "ContainerCache-1700000000123456789");
        assert_eq!(container.read_timeout(), DEFAULT_READ_TIMEOUT);
        assert_eq!(container.msg_len(), 0);
    }

    #[test]
    fn test_explicit_key_wins() {
        let h = Harness::new();
        let container = CacheContainer::new(
            h.parts(),
            0,
            Some("orders".to_string()),
            &FixedTimeProvider(1),
            WorkerOptions::default(),
        )
        .unwrap();
        assert_eq!(container.queue_key(), "orders");
    }

    #[test]
    fn test_negative_threshold_rejected() {
        let h = Harness::new();
        let err = CacheContainer::new(h.parts(), -1, None, &FixedTimeProvider(1), WorkerOptions::default())
            .err()
            .unwrap();
        assert!(matches!(err, AppError::InvalidCapacity { got: -1, min: 0 }));
    }

    #[tokio::test]
    async fn test_produce_pushes_marshalled_bytes() {
        let h = Harness::new();
        let container = h.container(0);

        container.produce(msg("a")).await.unwrap();
        container.produce(msg("b")).await.unwrap();

        assert_eq!(h.backend.push_calls(), 2);
        assert_eq!(h.backend.stored(container.queue_key()), 2);
        assert_eq!(container.worker_counts(), WorkerCounts::default());
    }

    #[tokio::test]
    async fn test_unbounded_never_spawns_transient() {
        let h = Harness::new();
        let container = h.container(0);
        h.backend.set_reported_length(Some(1_000_000));

        container.produce(msg("a")).await.unwrap();
        assert_eq!(h.backend.push_calls(), 1);
        assert_eq!(container.worker_counts().transient, 0);
    }

    #[tokio::test]
    async fn test_over_threshold_bypasses_push() {
        let h = Harness::new();
        let container = h.container(5);
        h.backend.set_reported_length(Some(5));

        container.produce(msg("overflow")).await.unwrap();

        assert_eq!(h.backend.push_calls(), 0);
        assert_eq!(container.worker_counts().transient, 1);
        assert!(eventually(Duration::from_secs(2), || h.seen() == vec!["overflow".to_string()]).await);
        assert!(eventually(Duration::from_secs(2), || container.worker_counts().transient == 0).await);
    }

    #[tokio::test]
    async fn test_length_error_falls_back_to_push() {
        let h = Harness::new();
        let container = h.container(5);
        h.backend.set_fail_length(true);

        container.produce(msg("a")).await.unwrap();

        assert_eq!(h.backend.push_calls(), 1);
        assert_eq!(h.records.count(RecordTag::Error), 1);
    }

    #[tokio::test]
    async fn test_push_failure_propagates() {
        let h = Harness::new();
        let container = h.container(0);
        h.backend.set_fail_push(true);

        let err = container.produce(msg("a")).await.unwrap_err();
        assert!(matches!(err, AppError::Backend(_)));
    }

    #[tokio::test]
    async fn test_marshal_failure_skips_push() {
        let h = Harness::new();
        let mut parts = h.parts();
        parts.marshal = Arc::new(|_m: &Envelope| Err(CodecError::Encode("nope".to_string())));
        let container = CacheContainer::new(parts, 0, None, &FixedTimeProvider(1), WorkerOptions::default())
            .unwrap();

        let err = container.produce(msg("a")).await.unwrap_err();
        assert!(matches!(err, AppError::Marshal(_)));
        assert_eq!(h.backend.push_calls(), 0);
    }

    #[tokio::test]
    async fn test_permanent_worker_survives_timeouts_and_bad_payloads() {
        let h = Harness::new();
        let container = h.container(0);
        container.consume().await.unwrap();

        // Let a few pops time out
        sleep(FAST * 3).await;
        assert_eq!(container.worker_counts().permanent, 1);
        assert!(h.records.count(RecordTag::Debug) >= 1);

        h.backend.inject(container.queue_key(), b"not json".to_vec());
        container.produce(msg("good")).await.unwrap();

        assert!(eventually(Duration::from_secs(2), || h.seen() == vec!["good".to_string()]).await);
        assert_eq!(h.records.count(RecordTag::Error), 1);
        assert_eq!(container.worker_counts().permanent, 1);
    }

    #[tokio::test]
    async fn test_transient_drains_then_exits_after_read_timeout() {
        let h = Harness::new();
        let container = h.container(1);
        container.produce(msg("queued")).await.unwrap();

        // Stored length 1 meets the threshold
        let started = Instant::now();
        container.produce(msg("seed")).await.unwrap();
        let transient = container.workers()[0].clone();

        tokio::time::timeout(Duration::from_secs(2), transient.wait_for(WorkerState::Exited))
            .await
            .expect("transient worker did not exit");

        assert!(started.elapsed() >= FAST);
        assert_eq!(h.seen(), vec!["seed".to_string(), "queued".to_string()]);
        assert_eq!(container.worker_counts().transient, 0);
    }

    #[tokio::test]
    async fn test_transient_skips_seed_with_empty_id() {
        let h = Harness::new();
        let container = h.container(1);
        h.backend.set_reported_length(Some(1));

        let blank = Envelope {
            id: String::new(),
            body: serde_json::Value::Null,
        };
        container.produce(blank).await.unwrap();

        assert!(eventually(Duration::from_secs(2), || container.worker_counts().transient == 0).await);
        assert!(h.seen().is_empty());
    }

    #[tokio::test]
    async fn test_permanent_respawns_after_consumer_panic() {
        let h = Harness::new();
        let mut parts = h.parts();
        let seen = Arc::clone(&h.seen);
        parts.consumer = Arc::new(move |m: Envelope| {
            if m.id == "poison" {
                panic!("poisoned message");
            }
            seen.lock().unwrap().push(m.id);
        });
        let options = WorkerOptions {
            keep_alive: FAST,
            record: Some(h.records.hook()),
            ..WorkerOptions::default()
        };
        let container =
            CacheContainer::new(parts, 0, None, &FixedTimeProvider(7), options).unwrap();
        container.consume().await.unwrap();

        container.produce(msg("poison")).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || container.restarts() == 1).await);
        assert!(eventually(Duration::from_secs(1), || container.worker_counts().permanent == 1).await);
        assert_eq!(h.records.count(RecordTag::Panic), 1);

        container.produce(msg("fine")).await.unwrap();
        assert!(eventually(Duration::from_secs(2), || h.seen() == vec!["fine".to_string()]).await);
    }
}
