// Redis ListBackend Implementation

use async_trait::async_trait;
use redis::aio::{ConnectionManager, MultiplexedConnection};
use redis::AsyncCommands;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::debug;

use surge_core::port::{BackendError, ListBackend};

/// Idle blocking connections kept for reuse; extras are closed on return
const MAX_IDLE_BLOCKING_CONNECTIONS: usize = 16;

/// Map Redis client errors onto backend errors
fn map_redis_error(err: redis::RedisError) -> BackendError {
    if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        BackendError::Connection(err.to_string())
    } else {
        BackendError::Command(err.to_string())
    }
}

/// BLPOP takes whole seconds and treats 0 as "block forever"
fn blpop_timeout_secs(timeout: Duration) -> u64 {
    timeout.as_secs().max(1)
}

/// Bounded stack of idle connections
struct IdlePool<C> {
    idle: Mutex<Vec<C>>,
    max_idle: usize,
}

impl<C> IdlePool<C> {
    fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    fn checkout(&self) -> Option<C> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop()
    }

    /// Returns false when the pool is full and `conn` was dropped
    fn checkin(&self, conn: C) -> bool {
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() >= self.max_idle {
            return false;
        }
        idle.push(conn);
        true
    }

    fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// Redis-backed list store
///
/// Pushes and length queries share a `ConnectionManager`. A pending BLPOP
/// holds the connection it runs on, so blocking pops check a dedicated
/// connection out of an idle pool and put it back once the reply arrives.
/// A connection that failed mid-command is dropped instead of returned.
pub struct RedisListBackend {
    client: redis::Client,
    redis: ConnectionManager,
    blocking: IdlePool<MultiplexedConnection>,
}

impl RedisListBackend {
    /// Connect to `redis_url` (e.g. "redis://127.0.0.1:6379")
    ///
    /// # Errors
    /// Returns `BackendError::Connection` if the URL is invalid or the server
    /// is unreachable.
    pub async fn connect(redis_url: &str) -> Result<Self, BackendError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let redis = ConnectionManager::new(client.clone())
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        debug!(redis_url, "Connected to Redis");
        Ok(Self {
            client,
            redis,
            blocking: IdlePool::new(MAX_IDLE_BLOCKING_CONNECTIONS),
        })
    }

    /// Blocking connections currently parked for reuse
    pub fn idle_blocking_connections(&self) -> usize {
        self.blocking.idle_count()
    }

    async fn blocking_connection(&self) -> Result<MultiplexedConnection, BackendError> {
        if let Some(conn) = self.blocking.checkout() {
            return Ok(conn);
        }
        debug!("Opening blocking connection");
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)
    }
}

#[async_trait]
impl ListBackend for RedisListBackend {
    async fn push(&self, key: &str, payload: Vec<u8>) -> Result<i64, BackendError> {
        let mut conn = self.redis.clone();
        conn.rpush::<_, _, i64>(key, payload)
            .await
            .map_err(map_redis_error)
    }

    async fn blocking_pop(
        &self,
        key: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<u8>>, BackendError> {
        let mut conn = self.blocking_connection().await?;

        // The server answers nil once the timeout passes, so no local deadline
        let reply: Option<(String, Vec<u8>)> = redis::cmd("BLPOP")
            .arg(key)
            .arg(blpop_timeout_secs(timeout))
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        self.blocking.checkin(conn);
        Ok(reply.map(|(_, payload)| payload))
    }

    async fn length(&self, key: &str) -> Result<i64, BackendError> {
        let mut conn = self.redis.clone();
        conn.llen::<_, i64>(key).await.map_err(map_redis_error)
    }
}
