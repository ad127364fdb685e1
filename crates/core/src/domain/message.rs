// Message Domain Model

use serde::{Deserialize, Serialize};

use super::error::{DomainError, Result};

/// Message identifier
pub type MessageId = String;

/// Capability every queued message must expose.
///
/// The identifier is the only thing a container inspects. Workers drop any
/// message whose id is empty; uniqueness is left to the caller.
pub trait Message: Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// True when a worker is allowed to hand the message to the consumer
pub fn is_deliverable<M: Message + ?Sized>(msg: &M) -> bool {
    !msg.id().is_empty()
}

/// Ready-made message: an identifier plus an arbitrary JSON body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub id: MessageId,
    pub body: serde_json::Value,
}

impl Envelope {
    /// Create a new envelope, rejecting an empty id
    pub fn new(id: impl Into<String>, body: serde_json::Value) -> Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(DomainError::EmptyMessageId);
        }
        Ok(Self { id, body })
    }

    /// Envelope without a body
    pub fn bare(id: impl Into<String>) -> Result<Self> {
        Self::new(id, serde_json::Value::Null)
    }
}

impl Message for Envelope {
    fn id(&self) -> &str {
        &self.id
    }
}

impl<M: Message> Message for Box<M> {
    fn id(&self) -> &str {
        (**self).id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_rejects_empty_id() {
        let result = Envelope::new("", json!({"k": 1}));
        assert_eq!(result.unwrap_err(), DomainError::EmptyMessageId);
    }

    #[test]
    fn test_envelope_keeps_id_and_body() {
        let msg = Envelope::new("order-7", json!({"qty": 3})).unwrap();
        assert_eq!(msg.id(), "order-7");
        assert_eq!(msg.body["qty"], 3);
        assert!(is_deliverable(&msg));
    }

    #[test]
    fn test_struct_literal_with_empty_id_is_not_deliverable() {
        // Bypasses the constructor, the way a decoded payload can
        let msg = Envelope {
            id: String::new(),
            body: serde_json::Value::Null,
        };
        assert!(!is_deliverable(&msg));
    }
}
