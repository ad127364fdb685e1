// Time Provider Port (for testability)

/// Time provider interface (allows mocking in tests)
pub trait TimeProvider: Send + Sync {
    /// Get current time in nanoseconds since epoch
    fn now_nanos(&self) -> i64;
}

/// System time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> i64 {
        let now = chrono::Utc::now();
        // Out of range only after the year 2262
        now.timestamp_nanos_opt()
            .unwrap_or_else(|| now.timestamp_micros().saturating_mul(1000))
    }
}

/// Fixed clock for deterministic tests
pub struct FixedTimeProvider(pub i64);

impl TimeProvider for FixedTimeProvider {
    fn now_nanos(&self) -> i64 {
        self.0
    }
}
