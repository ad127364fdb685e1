// Worker - supervision of permanent and transient worker tasks

pub mod constants;
mod panic_guard;

pub use panic_guard::{
    execute_guarded, guard, panic_message, PanicGuardResult, WorkerOutcome,
};

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::container::{ConsumeFn, ContainerBase};
use crate::application::restart::RestartDecision;
use crate::domain::{is_deliverable, Message, WorkerKind, WorkerLifecycle};
use crate::port::RecordTag;

/// The loops a container runs inside its workers
#[async_trait]
pub trait WorkerBody: Send + Sync + 'static {
    type Msg: Message;

    fn base(&self) -> &ContainerBase;

    /// Runs until the process ends; only leaves by panicking
    async fn run_permanent(self: Arc<Self>, lifecycle: WorkerLifecycle);

    /// Handles `seed` first, then drains until the queue looks empty
    async fn run_transient(self: Arc<Self>, seed: Option<Self::Msg>, lifecycle: WorkerLifecycle);
}

/// Start one permanent worker under supervision.
///
/// The body runs in its own task; the supervisor task awaits it, gives the
/// counter back, and on a panic asks the restart policy for a replacement.
pub fn spawn_permanent<B: WorkerBody>(body: &Arc<B>) -> WorkerLifecycle {
    let lifecycle = body.base().register(WorkerKind::Permanent);
    debug!(worker_id = %lifecycle.id(), "Permanent worker started");

    let body = Arc::clone(body);
    let lc = lifecycle.clone();
    tokio::spawn(async move {
        let handle = tokio::spawn(Arc::clone(&body).run_permanent(lc.clone()));
        let outcome = guard(handle).await;
        body.base().release(&lc);

        match outcome {
            WorkerOutcome::Panicked(msg) => {
                body.base().record(RecordTag::Panic, &msg);
                match body.base().restart_policy().should_restart() {
                    RestartDecision::Restart(attempt) => {
                        let replacement = spawn_permanent(&body);
                        info!(
                            failed_worker = %lc.id(),
                            worker_id = %replacement.id(),
                            attempt = %attempt,
                            "Permanent worker replaced"
                        );
                    }
                    RestartDecision::GiveUp => {
                        error!(failed_worker = %lc.id(), "Permanent worker not replaced");
                    }
                }
            }
            WorkerOutcome::Completed => {
                warn!(worker_id = %lc.id(), "Permanent worker returned unexpectedly");
            }
            WorkerOutcome::Cancelled => {
                debug!(worker_id = %lc.id(), "Permanent worker cancelled");
            }
        }
    });
    lifecycle
}

/// Start one transient worker seeded with `seed`. Never respawned.
pub fn spawn_transient<B: WorkerBody>(body: &Arc<B>, seed: Option<B::Msg>) -> WorkerLifecycle {
    let lifecycle = body.base().register(WorkerKind::Transient);
    info!(
        worker_id = %lifecycle.id(),
        transient_workers = %body.base().counts().transient,
        "Backpressure: transient worker started"
    );

    let body = Arc::clone(body);
    let lc = lifecycle.clone();
    tokio::spawn(async move {
        let handle = tokio::spawn(Arc::clone(&body).run_transient(seed, lc.clone()));
        let outcome = guard(handle).await;
        body.base().release(&lc);

        match outcome {
            WorkerOutcome::Completed => debug!(worker_id = %lc.id(), "Transient worker exited"),
            WorkerOutcome::Panicked(msg) => body.base().record(RecordTag::Panic, &msg),
            WorkerOutcome::Cancelled => debug!(worker_id = %lc.id(), "Transient worker cancelled"),
        }
    });
    lifecycle
}

/// Hand one message to the consumer.
///
/// Messages with an empty id are dropped. The consumer runs on the blocking
/// pool so a slow callback stalls only this worker. A panic in it is resumed
/// here and takes the whole worker down for the supervisor to handle.
///
/// Returns whether the consumer was called.
pub async fn deliver<M: Message>(consumer: &ConsumeFn<M>, msg: M) -> bool {
    if !is_deliverable(&msg) {
        debug!("Dropping message with empty id");
        return false;
    }

    let consumer = Arc::clone(consumer);
    match tokio::task::spawn_blocking(move || consumer(msg)).await {
        Ok(()) => true,
        Err(join_err) if join_err.is_panic() => std::panic::resume_unwind(join_err.into_panic()),
        Err(_) => {
            debug!("Consumer call cancelled");
            false
        }
    }
}
