//! Canned message handlers

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Notify;

use conveyor_core::{HandlerError, Message, MessageHandler};

use crate::EventLog;

/// Handles every message successfully.
pub struct SucceedingHandler {
    log: EventLog,
}

impl SucceedingHandler {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl MessageHandler for SucceedingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        self.log.push(format!(
            "handle:{}#{}",
            message.body_utf8_lossy(),
            message.dequeue_count
        ));
        Ok(())
    }
}

/// Fails every message.
pub struct FailingHandler {
    log: EventLog,
}

impl FailingHandler {
    pub fn new(log: EventLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl MessageHandler for FailingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        let body = message.body_utf8_lossy();
        self.log
            .push(format!("handle:{}#{}", body, message.dequeue_count));
        Err(format!("rejected {body}").into())
    }
}

/// Fails messages whose body contains the marker; succeeds otherwise.
pub struct MarkerRoutedHandler {
    log: EventLog,
    marker: String,
}

impl MarkerRoutedHandler {
    pub fn new(log: EventLog, marker: impl Into<String>) -> Self {
        Self {
            log,
            marker: marker.into(),
        }
    }
}

#[async_trait]
impl MessageHandler for MarkerRoutedHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        let body = message.body_utf8_lossy().to_string();
        self.log
            .push(format!("handle:{}#{}", body, message.dequeue_count));
        if body.contains(&self.marker) {
            return Err(format!("rejected {body}").into());
        }
        Ok(())
    }
}

/// Parks on a [`Notify`] until released, then succeeds.
///
/// Lets a test hold one queue's cycle mid-dispatch while asserting that
/// other queues keep moving. Each `notify_one` on the returned handle
/// releases one parked (or next) invocation.
pub struct BlockingHandler {
    log: EventLog,
    release: Arc<Notify>,
}

impl BlockingHandler {
    pub fn new(log: EventLog) -> (Self, Arc<Notify>) {
        let release = Arc::new(Notify::new());
        (
            Self {
                log,
                release: release.clone(),
            },
            release,
        )
    }
}

#[async_trait]
impl MessageHandler for BlockingHandler {
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        let body = message.body_utf8_lossy().to_string();
        self.log.push(format!("blocked:{body}"));
        self.release.notified().await;
        self.log
            .push(format!("handle:{}#{}", body, message.dequeue_count));
        Ok(())
    }
}
