// Factory - one entry point building either container variant

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::application::container::{
    CacheContainer, CacheParts, ChannelContainer, ConsumeFn, Container, WorkerOptions,
};
use crate::domain::Message;
use crate::error::{AppError, Result};
use crate::port::time_provider::SystemTimeProvider;
use crate::port::{ListBackend, MarshalFn, RecordHook, RecordTag, TimeProvider, UnmarshalFn};
use crate::settings::ContainerSettings;

/// Backend kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// In-process bounded buffer
    Channel,
    /// External list store
    Cache,
}

impl ContainerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerKind::Channel => "channel",
            ContainerKind::Cache => "cache",
        }
    }
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContainerKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "channel" => Ok(ContainerKind::Channel),
            "cache" => Ok(ContainerKind::Cache),
            _ => Err(AppError::UnknownContainerKind(s.to_string())),
        }
    }
}

/// Construction record for `new_container`
///
/// Cache-only fields (`backend`, `marshal`, `unmarshal`, `queue_key`) are
/// ignored by channel containers.
pub struct ContainerConfig<M: Message> {
    pub kind: ContainerKind,
    pub consumer: Option<ConsumeFn<M>>,
    /// Channel: buffer capacity (>= 1). Cache: length threshold (0 = unbounded).
    pub msg_len: i64,
    /// Channel: transient idle keep-alive. Cache: read timeout. Zero = default.
    pub idle_keep_alive: Duration,
    pub yield_every: u32,
    pub max_restarts: Option<u64>,
    pub record: Option<RecordHook>,
    pub backend: Option<Arc<dyn ListBackend>>,
    pub marshal: Option<MarshalFn<M>>,
    pub unmarshal: Option<UnmarshalFn<M>>,
    pub queue_key: Option<String>,
    pub time_provider: Arc<dyn TimeProvider>,
}

impl<M: Message> ContainerConfig<M> {
    pub fn new(kind: ContainerKind) -> Self {
        Self {
            kind,
            consumer: None,
            msg_len: 0,
            idle_keep_alive: Duration::ZERO,
            yield_every: 0,
            max_restarts: None,
            record: None,
            backend: None,
            marshal: None,
            unmarshal: None,
            queue_key: None,
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    /// Build from plain settings; fails on an unrecognised kind
    pub fn from_settings(settings: &ContainerSettings) -> Result<Self> {
        let kind = settings.kind.parse::<ContainerKind>()?;
        let mut config = Self::new(kind)
            .with_msg_len(settings.msg_len)
            .with_idle_keep_alive_secs(settings.idle_keep_alive_secs)
            .with_yield_every(settings.yield_every);
        config.max_restarts = settings.max_restarts;
        config.queue_key = settings.queue_key.clone();
        Ok(config)
    }

    pub fn with_consumer(mut self, consumer: impl Fn(M) + Send + Sync + 'static) -> Self {
        self.consumer = Some(Arc::new(consumer));
        self
    }

    pub fn with_msg_len(mut self, msg_len: i64) -> Self {
        self.msg_len = msg_len;
        self
    }

    /// Seconds; zero or negative selects the default
    pub fn with_idle_keep_alive_secs(mut self, secs: i64) -> Self {
        self.idle_keep_alive = u64::try_from(secs)
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO);
        self
    }

    pub fn with_idle_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.idle_keep_alive = keep_alive;
        self
    }

    pub fn with_yield_every(mut self, yield_every: u32) -> Self {
        self.yield_every = yield_every;
        self
    }

    pub fn with_max_restarts(mut self, max_restarts: u64) -> Self {
        self.max_restarts = Some(max_restarts);
        self
    }

    pub fn with_record(mut self, record: impl Fn(RecordTag, &str) + Send + Sync + 'static) -> Self {
        self.record = Some(Arc::new(record));
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn ListBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_codec(mut self, marshal: MarshalFn<M>, unmarshal: UnmarshalFn<M>) -> Self {
        self.marshal = Some(marshal);
        self.unmarshal = Some(unmarshal);
        self
    }

    pub fn with_queue_key(mut self, key: impl Into<String>) -> Self {
        self.queue_key = Some(key.into());
        self
    }

    pub fn with_time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    fn options(&self) -> WorkerOptions {
        WorkerOptions {
            keep_alive: self.idle_keep_alive,
            yield_every: self.yield_every,
            max_restarts: self.max_restarts,
            record: self.record.clone(),
        }
    }
}

/// Build a container from `config`
///
/// # Errors
/// - `MissingConsumer` if no consumer is set
/// - `InvalidCapacity` if `msg_len` is below the variant's minimum
/// - `MissingBackend` / `MissingUnmarshal` / `MissingMarshal` for a cache
///   container missing one of them
pub fn new_container<M: Message>(config: ContainerConfig<M>) -> Result<Arc<dyn Container<M>>> {
    let options = config.options();
    let consumer = config.consumer.ok_or(AppError::MissingConsumer)?;

    let container: Arc<dyn Container<M>> = match config.kind {
        ContainerKind::Channel => {
            Arc::new(ChannelContainer::with_options(config.msg_len, consumer, options)?)
        }
        ContainerKind::Cache => {
            let parts = CacheParts {
                backend: config.backend.ok_or(AppError::MissingBackend)?,
                consumer,
                unmarshal: config.unmarshal.ok_or(AppError::MissingUnmarshal)?,
                marshal: config.marshal.ok_or(AppError::MissingMarshal)?,
            };
            Arc::new(CacheContainer::new(
                parts,
                config.msg_len,
                config.queue_key,
                config.time_provider.as_ref(),
                options,
            )?)
        }
    };

    info!(kind = %config.kind, msg_len = %config.msg_len, "Container built");
    Ok(container)
}
