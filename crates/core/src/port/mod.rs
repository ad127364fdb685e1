// Port Layer - Interfaces for external dependencies

pub mod codec;
pub mod list_backend;
pub mod record;
pub mod time_provider; // For deterministic queue keys

// Re-exports
pub use codec::{json_marshal, json_unmarshal, CodecError, MarshalFn, UnmarshalFn};
pub use list_backend::{BackendError, ListBackend};
pub use record::{RecordHook, RecordTag};
pub use time_provider::TimeProvider;
