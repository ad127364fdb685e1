// Restart policy for permanent workers
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info};

/// Restart decision result
#[derive(Debug, PartialEq, Eq)]
pub enum RestartDecision {
    /// Respawn the worker (1-based restart attempt)
    Restart(u64),
    /// Restart budget exhausted, leave the worker dead
    GiveUp,
}

/// Decides whether a panicked permanent worker is replaced.
///
/// The counter is shared by every permanent worker of one container; a
/// consumer that panics on every message shows up as a climbing `restarts()`.
#[derive(Debug, Default)]
pub struct RestartPolicy {
    max_restarts: Option<u64>,
    restarts: AtomicU64,
}

impl RestartPolicy {
    /// Create a policy
    ///
    /// # Arguments
    /// * `max_restarts` - Total restarts allowed, `None` for unbounded
    pub fn new(max_restarts: Option<u64>) -> Self {
        Self {
            max_restarts,
            restarts: AtomicU64::new(0),
        }
    }

    pub fn unbounded() -> Self {
        Self::new(None)
    }

    pub fn bounded(max_restarts: u64) -> Self {
        Self::new(Some(max_restarts))
    }

    pub fn max_restarts(&self) -> Option<u64> {
        self.max_restarts
    }

    /// Restarts granted so far
    pub fn restarts(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }

    /// Consume one restart from the budget if any is left
    pub fn should_restart(&self) -> RestartDecision {
        let max = self.max_restarts;
        let granted = self
            .restarts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| match max {
                Some(limit) if n >= limit => None,
                _ => Some(n + 1),
            });

        match granted {
            Ok(previous) => {
                let attempt = previous + 1;
                info!(attempt = %attempt, max_restarts = ?max, "Restarting permanent worker");
                RestartDecision::Restart(attempt)
            }
            Err(spent) => {
                error!(restarts = %spent, "Permanent worker restart budget exhausted");
                RestartDecision::GiveUp
            }
        }
    }
}
