// Worker Domain Model

use std::fmt;
use std::sync::Arc;

use tokio::sync::watch;

use super::error::{DomainError, Result};

/// Which role a worker plays inside a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerKind {
    /// Started by `consume()`, lives until the process ends (respawned on panic)
    Permanent,
    /// Started by backpressure in `produce()`, exits once the queue looks drained
    Transient,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Permanent => write!(f, "permanent"),
            WorkerKind::Transient => write!(f, "transient"),
        }
    }
}

/// Worker lifecycle state
///
/// ```text
/// Running --(queue empty / pop timed out)--> Draining --(exit)--> Exited
///    ^                                          |
///    +-------------(item arrived)---------------+
/// Running --(panic)--> Exited
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Running,
    Draining,
    Exited,
}

impl WorkerState {
    pub fn can_transition_to(self, to: WorkerState) -> bool {
        matches!(
            (self, to),
            (WorkerState::Running, WorkerState::Draining)
                | (WorkerState::Running, WorkerState::Exited)
                | (WorkerState::Draining, WorkerState::Running)
                | (WorkerState::Draining, WorkerState::Exited)
        )
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Running => write!(f, "RUNNING"),
            WorkerState::Draining => write!(f, "DRAINING"),
            WorkerState::Exited => write!(f, "EXITED"),
        }
    }
}

/// Observable state cell for one worker.
///
/// Cloning shares the cell: the worker drives transitions, anyone holding a
/// clone can read the current state or wait for a given one.
#[derive(Clone)]
pub struct WorkerLifecycle {
    id: u64,
    kind: WorkerKind,
    state: Arc<watch::Sender<WorkerState>>,
}

impl WorkerLifecycle {
    pub fn new(id: u64, kind: WorkerKind) -> Self {
        let (tx, _rx) = watch::channel(WorkerState::Running);
        Self {
            id,
            kind,
            state: Arc::new(tx),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn state(&self) -> WorkerState {
        *self.state.borrow()
    }

    pub fn is_exited(&self) -> bool {
        self.state() == WorkerState::Exited
    }

    /// Move to `to`. Re-entering the current state is a no-op.
    pub fn transition(&self, to: WorkerState) -> Result<()> {
        let mut outcome = Ok(());
        self.state.send_if_modified(|current| {
            if *current == to {
                return false;
            }
            if current.can_transition_to(to) {
                *current = to;
                true
            } else {
                outcome = Err(DomainError::InvalidStateTransition {
                    from: current.to_string(),
                    to: to.to_string(),
                });
                false
            }
        });
        outcome
    }

    /// Resolve once the worker reaches `target`
    pub async fn wait_for(&self, target: WorkerState) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(|s| *s == target).await;
    }
}

impl fmt::Debug for WorkerLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerLifecycle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("state", &self.state())
            .finish()
    }
}

/// Snapshot of the active worker counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WorkerCounts {
    pub permanent: i64,
    pub transient: i64,
}

impl WorkerCounts {
    pub fn total(&self) -> i64 {
        self.permanent + self.transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_starts_running() {
        let lc = WorkerLifecycle::new(1, WorkerKind::Transient);
        assert_eq!(lc.state(), WorkerState::Running);
        assert_eq!(lc.kind(), WorkerKind::Transient);
    }

    #[test]
    fn test_drain_then_exit() {
        let lc = WorkerLifecycle::new(1, WorkerKind::Transient);
        lc.transition(WorkerState::Draining).unwrap();
        lc.transition(WorkerState::Exited).unwrap();
        assert!(lc.is_exited());
    }

    #[test]
    fn test_draining_can_resume() {
        let lc = WorkerLifecycle::new(2, WorkerKind::Permanent);
        lc.transition(WorkerState::Draining).unwrap();
        lc.transition(WorkerState::Running).unwrap();
        assert_eq!(lc.state(), WorkerState::Running);
    }

    #[test]
    fn test_exited_is_terminal() {
        let lc = WorkerLifecycle::new(3, WorkerKind::Transient);
        lc.transition(WorkerState::Exited).unwrap();

        let err = lc.transition(WorkerState::Running).unwrap_err();
        assert!(err.to_string().contains("EXITED -> RUNNING"));
        assert!(lc.is_exited());
    }

    #[test]
    fn test_same_state_is_noop() {
        let lc = WorkerLifecycle::new(4, WorkerKind::Transient);
        assert!(lc.transition(WorkerState::Running).is_ok());
    }

    #[tokio::test]
    async fn test_wait_for_observes_transition() {
        let lc = WorkerLifecycle::new(5, WorkerKind::Transient);
        let observer = lc.clone();
        let waiter = tokio::spawn(async move { observer.wait_for(WorkerState::Exited).await });

        lc.transition(WorkerState::Draining).unwrap();
        lc.transition(WorkerState::Exited).unwrap();

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .expect("wait_for did not resolve")
            .unwrap();
    }

    #[test]
    fn test_counts_total() {
        let counts = WorkerCounts {
            permanent: 1,
            transient: 3,
        };
        assert_eq!(counts.total(), 4);
    }
}
