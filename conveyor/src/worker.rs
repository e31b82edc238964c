//! Worker facade

use bytes::Bytes;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use conveyor_core::{validate_queue_name, MessageHandler, QueueTransport};

use crate::config::PollingConfig;
use crate::error::WorkerError;
use crate::poller::Poller;
use crate::registry::HandlerRegistry;

/// Queue worker: handler registration, poll lifecycle, and send
/// convenience over one transport.
///
/// A host registers handlers during startup, starts the queues it wants
/// polled, and calls [`Worker::shutdown`] (or
/// [`Worker::shutdown_graceful`]) when it exits. All state is in-memory;
/// a restarted process simply registers and starts again.
pub struct Worker {
    transport: Arc<dyn QueueTransport>,
    registry: HandlerRegistry,
    poller: Poller,
}

impl Worker {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            poller: Poller::new(transport.clone()),
            registry: HandlerRegistry::new(),
            transport,
        }
    }

    /// Register a handler and its polling policy for a queue.
    ///
    /// Must precede [`Worker::start`] for that queue. Re-registering an
    /// already started queue takes effect only after the queue is stopped
    /// and started again.
    pub fn register<H>(&self, config: PollingConfig, handler: H) -> Result<(), WorkerError>
    where
        H: MessageHandler + 'static,
    {
        validate_queue_name(&config.queue)?;
        self.registry.register(config, Arc::new(handler));
        Ok(())
    }

    /// Start polling a registered queue.
    pub async fn start(&self, queue: &str) -> Result<(), WorkerError> {
        let registration = self
            .registry
            .lookup(queue)
            .ok_or_else(|| WorkerError::NotRegistered(queue.to_string()))?;
        self.poller
            .start(registration.config.clone(), registration.handler.clone())
            .await
    }

    /// Start polling every registered queue, failing on the first error.
    pub async fn start_all(&self) -> Result<(), WorkerError> {
        for queue in self.registry.queue_names() {
            self.start(&queue).await?;
        }
        Ok(())
    }

    /// Stop polling a queue; no-op when it is not polling.
    pub async fn stop(&self, queue: &str) {
        self.poller.stop(queue).await;
    }

    /// Stop all polling; idempotent.
    pub async fn shutdown(&self) {
        self.poller.shutdown().await;
    }

    /// Stop all polling and wait up to `grace` for the loops to finish
    /// their in-flight work.
    pub async fn shutdown_graceful(&self, grace: Duration) {
        self.poller.shutdown_graceful(grace).await;
    }

    /// Send a raw payload, creating the queue if it is absent.
    pub async fn send(
        &self,
        queue: &str,
        body: impl Into<Bytes> + Send,
    ) -> Result<String, WorkerError> {
        self.transport.ensure_queue(queue).await?;
        let id = self.transport.send(queue, body.into()).await?;
        Ok(id)
    }

    /// Send a JSON-serialized payload, creating the queue if it is absent.
    pub async fn send_json<T: Serialize + Sync>(
        &self,
        queue: &str,
        payload: &T,
    ) -> Result<String, WorkerError> {
        let body = serde_json::to_vec(payload)?;
        self.send(queue, body).await
    }

    /// Whether a queue currently has an active poll loop.
    pub async fn is_polling(&self, queue: &str) -> bool {
        self.poller.is_polling(queue).await
    }

    /// Queues with an active poll loop, sorted.
    pub async fn active_queues(&self) -> Vec<String> {
        self.poller.active_queues().await
    }
}
