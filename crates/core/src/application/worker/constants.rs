// Worker constants (no magic values)
use std::time::Duration;

/// Idle keep-alive for in-process transient workers when unset or zero (1s)
pub const DEFAULT_IDLE_KEEP_ALIVE: Duration = Duration::from_secs(1);

/// Blocking-pop timeout for cache workers when unset or zero (3s)
/// Doubles as the transient worker's keep-alive window
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(3);

/// Consecutive dequeues before a transient worker yields to the scheduler
pub const DEFAULT_YIELD_EVERY: u32 = 10;

/// Sleep duration after a backend error before the permanent worker retries (1s)
pub const ERROR_RECOVERY_SLEEP_DURATION: Duration = Duration::from_secs(1);

/// Prefix of the generated external queue key, followed by creation time in ns
pub const CACHE_KEY_PREFIX: &str = "ContainerCache-";

/// Smallest capacity accepted by the in-process buffer
pub const MIN_CHANNEL_CAPACITY: i64 = 1;

/// Smallest length threshold accepted by the cache container (0 = unbounded)
pub const MIN_CACHE_MSG_LEN: i64 = 0;
