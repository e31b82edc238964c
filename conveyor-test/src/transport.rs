//! Recording transport wrapper

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use conveyor_core::{Message, QueueTransport, TransportError};

use crate::EventLog;

/// Wraps any transport, logging every call and optionally injecting
/// failures.
///
/// Events: `ensure:<queue>`, `send:<queue>:<id>`, `receive:<queue>:<count>`,
/// `receive_error:<queue>`, `delete:<id>`, `delete_error:<id>`.
pub struct RecordingTransport {
    inner: Arc<dyn QueueTransport>,
    log: EventLog,
    fail_receives: AtomicUsize,
    fail_deletes: AtomicUsize,
}

impl RecordingTransport {
    pub fn new(inner: Arc<dyn QueueTransport>, log: EventLog) -> Self {
        Self {
            inner,
            log,
            fail_receives: AtomicUsize::new(0),
            fail_deletes: AtomicUsize::new(0),
        }
    }

    /// Fail the next `count` receive calls with
    /// [`TransportError::Unavailable`].
    pub fn fail_next_receives(&self, count: usize) {
        self.fail_receives.store(count, Ordering::SeqCst);
    }

    /// Fail the next `count` delete calls with
    /// [`TransportError::Unavailable`].
    pub fn fail_next_deletes(&self, count: usize) {
        self.fail_deletes.store(count, Ordering::SeqCst);
    }

    fn take_fault(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QueueTransport for RecordingTransport {
    async fn ensure_queue(&self, queue: &str) -> Result<(), TransportError> {
        self.log.push(format!("ensure:{queue}"));
        self.inner.ensure_queue(queue).await
    }

    async fn send(&self, queue: &str, body: Bytes) -> Result<String, TransportError> {
        let id = self.inner.send(queue, body).await?;
        self.log.push(format!("send:{queue}:{id}"));
        Ok(id)
    }

    async fn receive(
        &self,
        queue: &str,
        max_messages: u32,
        visibility_timeout: Duration,
    ) -> Result<Vec<Message>, TransportError> {
        if Self::take_fault(&self.fail_receives) {
            self.log.push(format!("receive_error:{queue}"));
            return Err(TransportError::Unavailable(
                "injected receive failure".to_string(),
            ));
        }
        let batch = self
            .inner
            .receive(queue, max_messages, visibility_timeout)
            .await?;
        self.log.push(format!("receive:{queue}:{}", batch.len()));
        Ok(batch)
    }

    async fn delete(
        &self,
        queue: &str,
        message_id: &str,
        receipt_handle: &str,
    ) -> Result<(), TransportError> {
        if Self::take_fault(&self.fail_deletes) {
            self.log.push(format!("delete_error:{message_id}"));
            return Err(TransportError::Unavailable(
                "injected delete failure".to_string(),
            ));
        }
        self.inner.delete(queue, message_id, receipt_handle).await?;
        self.log.push(format!("delete:{message_id}"));
        Ok(())
    }
}
