//! Queue transport trait

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

use crate::message::Message;

/// Hard cap on messages returned by a single receive call.
pub const MAX_RECEIVE_BATCH: u32 = 32;

/// Longest queue name a transport accepts.
pub const MAX_QUEUE_NAME_LEN: usize = 80;

/// Errors from transport operations
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Queue does not exist: {0}")]
    QueueNotFound(String),

    #[error("Message not found: {0}")]
    MessageNotFound(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Abstract queue backend trait
///
/// All operations are keyed by queue name. A delivery received from
/// [`QueueTransport::receive`] stays hidden until its visibility timeout
/// elapses; deleting it requires the id and receipt handle of that exact
/// delivery.
#[async_trait]
pub trait QueueTransport: Send + Sync {
    /// Create the queue if it does not exist; idempotent.
    async fn ensure_queue(&self, queue: &str) -> Result<(), TransportError>;

    /// Append a message to the queue, returning its id.
    async fn send(&self, queue: &str, body: Bytes) -> Result<String, TransportError>;

    /// Receive up to `max_messages` visible messages, hiding each for
    /// `visibility_timeout`.
    async fn receive(
        &self,
        queue: &str,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<Message>, TransportError>;

    /// Delete one delivery by message id and receipt handle.
    async fn delete(
        &self,
        queue: &str,
        message_id: &str,
        receipt_handle: &str,
    ) -> Result<(), TransportError>;
}

/// Check that a queue name is usable as a key on any transport.
///
/// Names are 1 to [`MAX_QUEUE_NAME_LEN`] characters of ASCII alphanumerics,
/// `-` and `_`.
pub fn validate_queue_name(name: &str) -> Result<(), TransportError> {
    if name.is_empty() {
        return Err(TransportError::InvalidParameter(
            "queue name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_QUEUE_NAME_LEN {
        return Err(TransportError::InvalidParameter(format!(
            "queue name exceeds {} characters: {}",
            MAX_QUEUE_NAME_LEN, name
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(TransportError::InvalidParameter(format!(
            "queue name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_queue_name_accepts_typical_names() {
        assert!(validate_queue_name("orders").is_ok());
        assert!(validate_queue_name("orders-v2").is_ok());
        assert!(validate_queue_name("dead_letter_01").is_ok());
    }

    #[test]
    fn test_validate_queue_name_rejects_empty() {
        let err = validate_queue_name("").unwrap_err();
        assert!(matches!(err, TransportError::InvalidParameter(_)));
    }

    #[test]
    fn test_validate_queue_name_rejects_long_names() {
        let name = "q".repeat(MAX_QUEUE_NAME_LEN + 1);
        let err = validate_queue_name(&name).unwrap_err();
        assert!(matches!(err, TransportError::InvalidParameter(_)));
    }

    #[test]
    fn test_validate_queue_name_rejects_invalid_characters() {
        for name in ["orders queue", "orders/1", "orders.fifo", "naïve"] {
            let err = validate_queue_name(name).unwrap_err();
            assert!(matches!(err, TransportError::InvalidParameter(_)));
        }
    }
}
