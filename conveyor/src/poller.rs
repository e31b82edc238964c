//! Poll loop management

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use conveyor_core::{MessageHandler, QueueTransport};

use crate::config::PollingConfig;
use crate::dispatch::Dispatcher;
use crate::error::WorkerError;

/// Cancellation signal and task reference for one queue's running cycle.
struct LoopHandle {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Runs one independent, cancellable polling cycle per queue.
///
/// The handle map is guarded by a single async mutex, so `start`, `stop`,
/// and `shutdown` serialize: two concurrent `start` calls for one queue can
/// never both succeed, and `shutdown` always sees a consistent set of
/// loops.
pub struct Poller {
    transport: Arc<dyn QueueTransport>,
    loops: Mutex<HashMap<String, LoopHandle>>,
}

impl Poller {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self {
            transport,
            loops: Mutex::new(HashMap::new()),
        }
    }

    /// Begin polling a queue.
    ///
    /// Creates the queue on the transport if it is absent, then schedules
    /// the cycle and returns without waiting for it. Fails with
    /// [`WorkerError::AlreadyPolling`] when the queue already has a loop.
    pub async fn start(
        &self,
        config: PollingConfig,
        handler: Arc<dyn MessageHandler>,
    ) -> Result<(), WorkerError> {
        let mut loops = self.loops.lock().await;
        if loops.contains_key(&config.queue) {
            warn!(queue = %config.queue, "Ignoring start; queue is already being polled");
            return Err(WorkerError::AlreadyPolling(config.queue));
        }

        self.transport.ensure_queue(&config.queue).await?;

        let config = config.normalized();
        let queue = config.queue.clone();
        info!(
            queue = %queue,
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            visibility_timeout_secs = config.visibility_timeout.as_secs(),
            max_messages = config.max_messages,
            max_dequeue_count = config.max_dequeue_count,
            "Starting poll loop"
        );

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let task = tokio::spawn(poll_loop(
            self.transport.clone(),
            Dispatcher::new(self.transport.clone()),
            config,
            handler,
            cancel_rx,
        ));
        loops.insert(
            queue,
            LoopHandle {
                cancel: cancel_tx,
                task,
            },
        );
        Ok(())
    }

    /// Cancel one queue's loop; no-op when it is not polling.
    pub async fn stop(&self, queue: &str) {
        let mut loops = self.loops.lock().await;
        if let Some(handle) = loops.remove(queue) {
            info!(queue = %queue, "Stopping poll loop");
            let _ = handle.cancel.send(true);
        } else {
            debug!(queue = %queue, "Stop requested for queue that is not polling");
        }
    }

    /// Cancel every loop; idempotent.
    ///
    /// Loops observe the signal at their next boundary: an iteration in
    /// flight finishes its current dispatch, then exits without another
    /// receive.
    pub async fn shutdown(&self) {
        let mut loops = self.loops.lock().await;
        if loops.is_empty() {
            return;
        }
        info!(count = loops.len(), "Shutting down poll loops");
        for (_, handle) in loops.drain() {
            let _ = handle.cancel.send(true);
        }
    }

    /// Cancel every loop, then wait up to `grace` for the loop tasks to
    /// finish. Tasks still draining at the deadline keep running detached;
    /// they are never aborted, so an in-flight dispatch always settles.
    pub async fn shutdown_graceful(&self, grace: Duration) {
        let tasks: Vec<(String, JoinHandle<()>)> = {
            let mut loops = self.loops.lock().await;
            loops
                .drain()
                .map(|(queue, handle)| {
                    let _ = handle.cancel.send(true);
                    (queue, handle.task)
                })
                .collect()
        };
        if tasks.is_empty() {
            return;
        }
        info!(count = tasks.len(), "Shutting down poll loops");

        let deadline = tokio::time::Instant::now() + grace;
        for (queue, task) in tasks {
            match tokio::time::timeout_at(deadline, task).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(queue = %queue, error = %err, "Poll loop task failed"),
                Err(_) => {
                    warn!(queue = %queue, "Poll loop still draining at shutdown deadline");
                }
            }
        }
    }

    /// Whether a queue currently has an active loop.
    pub async fn is_polling(&self, queue: &str) -> bool {
        self.loops.lock().await.contains_key(queue)
    }

    /// Queues with an active loop, sorted.
    pub async fn active_queues(&self) -> Vec<String> {
        let loops = self.loops.lock().await;
        let mut names: Vec<String> = loops.keys().cloned().collect();
        names.sort();
        names
    }
}

/// One queue's receive/dispatch/sleep cycle.
///
/// Cancellation is honored at the top of each iteration and interrupts the
/// inter-iteration sleep; a receive or dispatch already in progress runs to
/// completion so no message is abandoned mid-settlement. A transport
/// failure on receive skips that whole batch and the cycle carries on.
async fn poll_loop(
    transport: Arc<dyn QueueTransport>,
    dispatcher: Dispatcher,
    config: PollingConfig,
    handler: Arc<dyn MessageHandler>,
    mut cancel: watch::Receiver<bool>,
) {
    loop {
        if *cancel.borrow() {
            break;
        }

        match transport
            .receive(&config.queue, config.max_messages, config.visibility_timeout)
            .await
        {
            Ok(batch) => {
                if !batch.is_empty() {
                    debug!(queue = %config.queue, count = batch.len(), "Dispatching batch");
                }
                for message in batch {
                    dispatcher
                        .dispatch(message, handler.as_ref(), &config)
                        .await;
                }
            }
            Err(err) => {
                warn!(queue = %config.queue, error = %err, "Receive failed; skipping batch");
            }
        }

        tokio::select! {
            () = tokio::time::sleep(config.poll_interval) => {}
            _ = cancel.changed() => break,
        }
    }

    debug!(queue = %config.queue, "Poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use conveyor_core::{HandlerError, Message};
    use conveyor_memory::MemoryTransport;

    fn noop_handler() -> Arc<dyn MessageHandler> {
        Arc::new(|_message: Message| async { Ok::<(), HandlerError>(()) })
    }

    fn quick_config(queue: &str) -> PollingConfig {
        PollingConfig::new(queue).with_poll_interval(Duration::from_millis(20))
    }

    #[tokio::test]
    async fn test_start_twice_fails_with_already_polling() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap();

        let err = poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::AlreadyPolling(queue) if queue == "orders"));
        assert!(poller.is_polling("orders").await);

        poller.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_creates_the_queue() {
        let transport = Arc::new(MemoryTransport::new());
        let poller = Poller::new(transport.clone());
        poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap();

        assert_eq!(transport.message_count("orders"), 0);
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_propagates_transport_failure() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        let err = poller
            .start(quick_config("not a valid name"), noop_handler())
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::Transport(_)));
        assert!(!poller.is_polling("not a valid name").await);
    }

    #[tokio::test]
    async fn test_stop_without_loop_is_a_noop() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        poller.stop("orders").await;
        assert!(!poller.is_polling("orders").await);
    }

    #[tokio::test]
    async fn test_stop_frees_the_slot_for_restart() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap();
        poller.stop("orders").await;
        assert!(!poller.is_polling("orders").await);

        poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap();
        assert!(poller.is_polling("orders").await);
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_is_idempotent() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap();
        poller
            .start(quick_config("billing"), noop_handler())
            .await
            .unwrap();

        poller.shutdown().await;
        assert!(poller.active_queues().await.is_empty());
        poller.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_graceful_joins_loops() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        poller
            .start(quick_config("orders"), noop_handler())
            .await
            .unwrap();

        poller.shutdown_graceful(Duration::from_secs(1)).await;
        assert!(poller.active_queues().await.is_empty());
    }

    #[tokio::test]
    async fn test_active_queues_sorted() {
        let poller = Poller::new(Arc::new(MemoryTransport::new()));
        for queue in ["orders", "billing", "audit"] {
            poller
                .start(quick_config(queue), noop_handler())
                .await
                .unwrap();
        }

        assert_eq!(poller.active_queues().await, vec!["audit", "billing", "orders"]);
        poller.shutdown().await;
    }
}
