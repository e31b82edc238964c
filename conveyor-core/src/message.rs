//! Message delivery record

use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::borrow::Cow;

/// One delivery of a queued message.
///
/// A `Message` describes a single delivery, not the logical message itself:
/// `receipt_handle` is only valid for this delivery and is rotated by the
/// transport every time the message becomes visible again, and
/// `dequeue_count` reports how many deliveries preceded this one (0 on the
/// first receive). The engine never interprets `body`; decoding belongs to
/// the handler.
#[derive(Debug, Clone)]
pub struct Message {
    /// Transport-assigned identifier, stable across redeliveries.
    pub id: String,
    /// Raw payload.
    pub body: Bytes,
    /// Number of prior deliveries of this message.
    pub dequeue_count: u32,
    /// When the message was sent to the queue.
    pub inserted_at: DateTime<Utc>,
    /// When the transport will drop the message if it is never deleted.
    pub expires_at: DateTime<Utc>,
    /// Acknowledgment token for this delivery, required to delete it.
    pub receipt_handle: String,
}

impl Message {
    /// Body as UTF-8 text, lossily converted.
    pub fn body_utf8_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}
