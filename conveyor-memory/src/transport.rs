//! In-memory queue storage

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use conveyor_core::{
    validate_queue_name, Message, QueueTransport, TransportError, MAX_RECEIVE_BATCH,
};

const DEFAULT_MESSAGE_TTL_SECS: i64 = 345_600; // 4 days

/// A message as stored in a queue.
///
/// `visible_at` in the past means the message can be delivered;
/// `delivery_count` counts completed deliveries, so the count reported on
/// a receive is the value before that receive increments it.
#[derive(Debug, Clone)]
struct StoredMessage {
    id: String,
    body: Bytes,
    delivery_count: u32,
    inserted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    receipt_handle: String,
    visible_at: DateTime<Utc>,
}

impl StoredMessage {
    fn new(body: Bytes, ttl: ChronoDuration) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            body,
            delivery_count: 0,
            inserted_at: now,
            expires_at: now + ttl,
            receipt_handle: Uuid::new_v4().to_string(),
            visible_at: now,
        }
    }
}

/// In-memory queue backend.
///
/// Messages stay in their queue until deleted or expired; a receive hides
/// each delivered message for the requested visibility timeout and rotates
/// its receipt handle, so stale receipts cannot delete a newer delivery.
#[derive(Debug)]
pub struct MemoryTransport {
    queues: DashMap<String, VecDeque<StoredMessage>>,
    message_ttl: ChronoDuration,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self {
            queues: DashMap::new(),
            message_ttl: ChronoDuration::seconds(DEFAULT_MESSAGE_TTL_SECS),
        }
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the retention period applied to newly sent messages.
    ///
    /// A `ttl` beyond the representable timestamp range is rejected with a
    /// warning and the default retention is kept.
    pub fn with_message_ttl(mut self, ttl: Duration) -> Self {
        self.message_ttl = match ChronoDuration::from_std(ttl) {
            Ok(converted) => converted,
            Err(_) => {
                warn!(ttl_secs = ttl.as_secs(), "Message TTL out of range; keeping default");
                ChronoDuration::seconds(DEFAULT_MESSAGE_TTL_SECS)
            }
        };
        self
    }

    /// Number of stored messages, visible or not (for testing/diagnostics).
    pub fn message_count(&self, queue: &str) -> usize {
        self.queues.get(queue).map_or(0, |q| q.len())
    }
}

#[async_trait]
impl QueueTransport for MemoryTransport {
    async fn ensure_queue(&self, queue: &str) -> Result<(), TransportError> {
        validate_queue_name(queue)?;

        if let Entry::Vacant(entry) = self.queues.entry(queue.to_string()) {
            info!(queue = %queue, "Created queue");
            entry.insert(VecDeque::new());
        }
        Ok(())
    }

    async fn send(&self, queue: &str, body: Bytes) -> Result<String, TransportError> {
        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let message = StoredMessage::new(body, self.message_ttl);
        let id = message.id.clone();
        messages.push_back(message);

        debug!(queue = %queue, message_id = %id, "Sent message");
        Ok(id)
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<Message>, TransportError> {
        let visibility = ChronoDuration::from_std(visibility_timeout).map_err(|_| {
            TransportError::InvalidParameter("visibility timeout out of range".to_string())
        })?;
        let max = max_messages.clamp(1, MAX_RECEIVE_BATCH) as usize;

        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let now = Utc::now();
        let stored = messages.len();
        messages.retain(|m| m.expires_at > now);
        let expired = stored - messages.len();
        if expired > 0 {
            debug!(queue = %queue, count = expired, "Dropped expired messages");
        }

        let mut batch = Vec::new();
        for message in messages.iter_mut() {
            if batch.len() == max {
                break;
            }
            if message.visible_at > now {
                continue;
            }

            message.receipt_handle = Uuid::new_v4().to_string();
            message.visible_at = now + visibility;
            batch.push(Message {
                id: message.id.clone(),
                body: message.body.clone(),
                dequeue_count: message.delivery_count,
                inserted_at: message.inserted_at,
                expires_at: message.expires_at,
                receipt_handle: message.receipt_handle.clone(),
            });
            message.delivery_count += 1;
        }

        debug!(queue = %queue, count = batch.len(), "Received messages");
        Ok(batch)
    }

    async fn delete(
        &self,
        queue: &str,
        message_id: &str,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        let mut messages = self
            .queues
            .get_mut(queue)
            .ok_or_else(|| TransportError::QueueNotFound(queue.to_string()))?;

        let position = messages
            .iter()
            .position(|m| m.id == message_id && m.receipt_handle == receipt_handle)
            .ok_or_else(|| TransportError::MessageNotFound(message_id.to_string()))?;
        messages.remove(position);

        debug!(queue = %queue, message_id = %message_id, "Deleted message");
        Ok(())
    }
}
