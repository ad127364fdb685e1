// List Backend Port (Interface)
// The four list operations an external queue store must provide

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// List backend errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Backend connection failed: {0}")]
    Connection(String),

    #[error("Backend command failed: {0}")]
    Command(String),

    #[error("Backend timed out after {0:?}")]
    Timeout(Duration),
}

/// External blocking list (Redis-like) used as a message queue
///
/// Implementations:
/// - RedisListBackend (surge-infra-redis): RPUSH / BLPOP / LLEN
/// - mocks::InMemoryListBackend: for tests
#[async_trait]
pub trait ListBackend: Send + Sync {
    /// Append a payload to the tail of the list, returning the new length
    async fn push(&self, key: &str, payload: Vec<u8>) -> Result<i64, BackendError>;

    /// Remove and return the head of the list, waiting up to `timeout`
    ///
    /// # Returns
    /// - `Ok(Some(payload))` when an item was popped
    /// - `Ok(None)` when the timeout expired on an empty list (not an error)
    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BackendError>;

    /// Current list length. Advisory only, may be stale.
    async fn length(&self, key: &str) -> Result<i64, BackendError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;
    use tokio::sync::Notify;
    use tokio::time::Instant;

    /// In-memory list store with blocking pop semantics
    #[derive(Default)]
    pub struct InMemoryListBackend {
        lists: Mutex<HashMap<String, VecDeque<Vec<u8>>>>,
        notify: Notify,
        push_calls: AtomicU64,
        pop_calls: AtomicU64,
        reported_length: Mutex<Option<i64>>,
        fail_push: AtomicBool,
        fail_length: AtomicBool,
    }

    impl InMemoryListBackend {
        pub fn new() -> Self {
            Self::default()
        }

        /// Number of `push` calls received (including failed ones)
        pub fn push_calls(&self) -> u64 {
            self.push_calls.load(Ordering::SeqCst)
        }

        /// Number of `blocking_pop` calls received
        pub fn pop_calls(&self) -> u64 {
            self.pop_calls.load(Ordering::SeqCst)
        }

        /// Override what `length` reports (None = real length)
        pub fn set_reported_length(&self, length: Option<i64>) {
            *self.reported_length.lock().unwrap() = length;
        }

        pub fn set_fail_push(&self, fail: bool) {
            self.fail_push.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_length(&self, fail: bool) {
            self.fail_length.store(fail, Ordering::SeqCst);
        }

        /// Insert a payload without counting it as a `push` call
        pub fn inject(&self, key: &str, payload: Vec<u8>) {
            self.lists
                .lock()
                .unwrap()
                .entry(key.to_string())
                .or_default()
                .push_back(payload);
            self.notify.notify_waiters();
        }

        /// Real number of stored items under `key`
        pub fn stored(&self, key: &str) -> usize {
            self.lists.lock().unwrap().get(key).map_or(0, |l| l.len())
        }

        fn try_pop(&self, key: &str) -> Option<Vec<u8>> {
            self.lists
                .lock()
                .unwrap()
                .get_mut(key)
                .and_then(|l| l.pop_front())
        }
    }

    #[async_trait]
    impl ListBackend for InMemoryListBackend {
        async fn push(&self, key: &str, payload: Vec<u8>) -> Result<i64, BackendError> {
            self.push_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_push.load(Ordering::SeqCst) {
                return Err(BackendError::Connection("mock push failure".to_string()));
            }
            let len = {
                let mut lists = self.lists.lock().unwrap();
                let list = lists.entry(key.to_string()).or_default();
                list.push_back(payload);
                list.len() as i64
            };
            self.notify.notify_waiters();
            Ok(len)
        }

        async fn blocking_pop(
            &self,
            key: &str,
            timeout: Duration,
        ) -> Result<Option<Vec<u8>>, BackendError> {
            self.pop_calls.fetch_add(1, Ordering::SeqCst);
            let deadline = Instant::now() + timeout;
            loop {
                let notified = self.notify.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                if let Some(payload) = self.try_pop(key) {
                    return Ok(Some(payload));
                }
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    return Ok(None);
                }
            }
        }

        async fn length(&self, key: &str) -> Result<i64, BackendError> {
            if self.fail_length.load(Ordering::SeqCst) {
                return Err(BackendError::Command("mock length failure".to_string()));
            }
            if let Some(forced) = *self.reported_length.lock().unwrap() {
                return Ok(forced);
            }
            Ok(self.stored(key) as i64)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_push_then_pop_is_fifo() {
            let backend = InMemoryListBackend::new();
            backend.push("k", b"a".to_vec()).await.unwrap();
            backend.push("k", b"b".to_vec()).await.unwrap();

            let first = backend.blocking_pop("k", Duration::from_millis(10)).await.unwrap();
            let second = backend.blocking_pop("k", Duration::from_millis(10)).await.unwrap();
            assert_eq!(first, Some(b"a".to_vec()));
            assert_eq!(second, Some(b"b".to_vec()));
        }

        #[tokio::test]
        async fn test_pop_times_out_with_none() {
            let backend = InMemoryListBackend::new();
            let started = Instant::now();
            let popped = backend.blocking_pop("k", Duration::from_millis(50)).await.unwrap();
            assert!(popped.is_none());
            assert!(started.elapsed() >= Duration::from_millis(50));
        }

        #[tokio::test]
        async fn test_pop_wakes_on_push() {
            let backend = std::sync::Arc::new(InMemoryListBackend::new());
            let popper = backend.clone();
            let handle = tokio::spawn(async move {
                popper.blocking_pop("k", Duration::from_secs(5)).await
            });

            tokio::time::sleep(Duration::from_millis(20)).await;
            backend.push("k", b"late".to_vec()).await.unwrap();

            let popped = handle.await.unwrap().unwrap();
            assert_eq!(popped, Some(b"late".to_vec()));
        }

        #[tokio::test]
        async fn test_reported_length_override() {
            let backend = InMemoryListBackend::new();
            backend.set_reported_length(Some(42));
            assert_eq!(backend.length("k").await.unwrap(), 42);
            backend.set_reported_length(None);
            assert_eq!(backend.length("k").await.unwrap(), 0);
        }
    }
}
