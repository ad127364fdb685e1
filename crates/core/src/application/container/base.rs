// State shared by every container variant: counters, record hook, restarts

use std::fmt::Display;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{trace, warn};

use crate::application::restart::RestartPolicy;
use crate::application::worker::{execute_guarded, PanicGuardResult};
use crate::domain::{WorkerCounts, WorkerKind, WorkerLifecycle, WorkerState};
use crate::port::{RecordHook, RecordTag};

pub struct ContainerBase {
    permanent: AtomicI64,
    transient: AtomicI64,
    next_worker_id: AtomicU64,
    workers: Mutex<Vec<WorkerLifecycle>>,
    record: Option<RecordHook>,
    restart_policy: RestartPolicy,
}

impl ContainerBase {
    pub fn new(record: Option<RecordHook>, restart_policy: RestartPolicy) -> Self {
        Self {
            permanent: AtomicI64::new(0),
            transient: AtomicI64::new(0),
            next_worker_id: AtomicU64::new(1),
            workers: Mutex::new(Vec::new()),
            record,
            restart_policy,
        }
    }

    /// Lock-free snapshot of both counters
    pub fn counts(&self) -> WorkerCounts {
        WorkerCounts {
            permanent: self.permanent.load(Ordering::SeqCst),
            transient: self.transient.load(Ordering::SeqCst),
        }
    }

    pub fn restart_policy(&self) -> &RestartPolicy {
        &self.restart_policy
    }

    /// Count a new worker and hand out its lifecycle cell
    pub fn register(&self, kind: WorkerKind) -> WorkerLifecycle {
        self.counter(kind).fetch_add(1, Ordering::SeqCst);
        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let lifecycle = WorkerLifecycle::new(id, kind);

        let mut workers = self.workers.lock().unwrap_or_else(PoisonError::into_inner);
        workers.retain(|w| !w.is_exited());
        workers.push(lifecycle.clone());
        lifecycle
    }

    /// Uncount a finished worker and mark it exited
    pub fn release(&self, lifecycle: &WorkerLifecycle) {
        self.counter(lifecycle.kind()).fetch_sub(1, Ordering::SeqCst);
        // Exited is reachable from every state
        let _ = lifecycle.transition(WorkerState::Exited);
    }

    /// Lifecycles of workers that have not exited yet
    pub fn live_workers(&self) -> Vec<WorkerLifecycle> {
        self.workers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|w| !w.is_exited())
            .cloned()
            .collect()
    }

    /// Forward an internal event to the tracing log and the optional hook
    pub fn record(&self, tag: RecordTag, detail: impl Display) {
        let detail = detail.to_string();
        match tag {
            RecordTag::Debug => trace!(tag = %tag, detail = %detail, "container record"),
            RecordTag::Error => warn!(tag = %tag, detail = %detail, "container record"),
            // Panics are already logged at error level by the supervisor
            RecordTag::Panic => {}
        }

        if let Some(hook) = &self.record {
            let call = AssertUnwindSafe(|| hook(tag, &detail));
            if let PanicGuardResult::Panicked(msg) = execute_guarded(call) {
                warn!(panic_msg = %msg, "Record hook panicked");
            }
        }
    }

    fn counter(&self, kind: WorkerKind) -> &AtomicI64 {
        match kind {
            WorkerKind::Permanent => &self.permanent,
            WorkerKind::Transient => &self.transient,
        }
    }
}
