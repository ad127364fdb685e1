// Record Hook Port
// Optional fire-and-forget sink for worker-internal events

use std::fmt;
use std::sync::Arc;

/// Category of a recorded event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordTag {
    /// Decode failures, backend errors
    Error,
    /// Pop timeouts and other expected idle signals
    Debug,
    /// A consumer panicked inside a worker
    Panic,
}

impl RecordTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordTag::Error => "PC-ErrTag",
            RecordTag::Debug => "PC-DebugTag",
            RecordTag::Panic => "PC-PanicTag",
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied hook receiving `(tag, detail)`
pub type RecordHook = Arc<dyn Fn(RecordTag, &str) + Send + Sync>;

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Collects every record for later inspection
    #[derive(Default, Clone)]
    pub struct RecordCollector {
        records: Arc<Mutex<Vec<(RecordTag, String)>>>,
    }

    impl RecordCollector {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn hook(&self) -> RecordHook {
            let records = Arc::clone(&self.records);
            Arc::new(move |tag: RecordTag, detail: &str| {
                records.lock().unwrap().push((tag, detail.to_string()));
            })
        }

        pub fn records(&self) -> Vec<(RecordTag, String)> {
            self.records.lock().unwrap().clone()
        }

        pub fn count(&self, tag: RecordTag) -> usize {
            self.records
                .lock()
                .unwrap()
                .iter()
                .filter(|(t, _)| *t == tag)
                .count()
        }
    }
}
