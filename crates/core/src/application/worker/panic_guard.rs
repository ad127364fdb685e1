// Panic isolation for worker safety
use std::any::Any;
use std::panic::{catch_unwind, UnwindSafe};
use tokio::task::JoinHandle;
use tracing::error;

/// Result of a panic-guarded execution
#[derive(Debug)]
pub enum PanicGuardResult<T> {
    /// Execution completed successfully
    Success(T),
    /// Execution panicked
    Panicked(String),
}

/// How a supervised worker task ended
#[derive(Debug, PartialEq, Eq)]
pub enum WorkerOutcome {
    /// The worker body returned on its own
    Completed,
    /// The worker body panicked (consumer, unmarshal or anything else)
    Panicked(String),
    /// The task was aborted, usually because the runtime is shutting down
    Cancelled,
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}

/// Execute a closure with panic isolation
///
/// If the closure panics, the panic is caught and returned as
/// `PanicGuardResult::Panicked`. Used around caller-supplied hooks that must
/// never take a worker down with them.
pub fn execute_guarded<F, T>(f: F) -> PanicGuardResult<T>
where
    F: FnOnce() -> T + UnwindSafe,
{
    match catch_unwind(f) {
        Ok(result) => PanicGuardResult::Success(result),
        Err(payload) => PanicGuardResult::Panicked(panic_message(payload.as_ref())),
    }
}

/// Await a worker task and classify how it ended
///
/// Panics are caught by the JoinHandle, so they never reach the process.
pub async fn guard(handle: JoinHandle<()>) -> WorkerOutcome {
    match handle.await {
        Ok(()) => WorkerOutcome::Completed,
        Err(join_err) if join_err.is_panic() => {
            let msg = panic_message(join_err.into_panic().as_ref());
            error!(panic_msg = %msg, "Worker task panicked");
            WorkerOutcome::Panicked(msg)
        }
        Err(_) => WorkerOutcome::Cancelled,
    }
}
