//! Message dispatch policy

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

use conveyor_core::{Message, MessageHandler, QueueTransport};

use crate::config::PollingConfig;

/// Applies the success/failure/poison policy to received messages.
pub struct Dispatcher {
    transport: Arc<dyn QueueTransport>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn QueueTransport>) -> Self {
        Self { transport }
    }

    /// Deliver one message to its handler and settle it with the transport.
    ///
    /// Success deletes the delivery. Failure leaves it untouched for
    /// redelivery, unless its dequeue count has reached
    /// `config.max_dequeue_count`, in which case the message is removed as
    /// poison. Nothing propagates out of a dispatch: settlement failures are
    /// logged and the delivery simply reappears after its visibility
    /// timeout.
    pub async fn dispatch(
        &self,
        message: Message,
        handler: &dyn MessageHandler,
        config: &PollingConfig,
    ) {
        let message_id = message.id.clone();
        let receipt_handle = message.receipt_handle.clone();
        let dequeue_count = message.dequeue_count;

        let outcome = AssertUnwindSafe(handler.handle(message)).catch_unwind().await;

        match outcome {
            Ok(Ok(())) => {
                debug!(
                    queue = %config.queue,
                    message_id = %message_id,
                    "Message handled"
                );
                if let Err(err) = self
                    .transport
                    .delete(&config.queue, &message_id, &receipt_handle)
                    .await
                {
                    warn!(
                        queue = %config.queue,
                        message_id = %message_id,
                        error = %err,
                        "Failed to delete handled message; it will be redelivered"
                    );
                }
            }
            Ok(Err(err)) => {
                self.settle_failure(
                    &message_id,
                    &receipt_handle,
                    dequeue_count,
                    config,
                    &err.to_string(),
                )
                .await;
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                self.settle_failure(
                    &message_id,
                    &receipt_handle,
                    dequeue_count,
                    config,
                    &format!("handler panicked: {reason}"),
                )
                .await;
            }
        }
    }

    async fn settle_failure(
        &self,
        message_id: &str,
        receipt_handle: &str,
        dequeue_count: u32,
        config: &PollingConfig,
        reason: &str,
    ) {
        if dequeue_count >= config.max_dequeue_count {
            error!(
                queue = %config.queue,
                message_id = %message_id,
                dequeue_count = dequeue_count,
                max_dequeue_count = config.max_dequeue_count,
                error = %reason,
                "Handler failed and message exhausted its deliveries; removing it"
            );
            if let Err(err) = self
                .transport
                .delete(&config.queue, message_id, receipt_handle)
                .await
            {
                warn!(
                    queue = %config.queue,
                    message_id = %message_id,
                    error = %err,
                    "Failed to remove poison message"
                );
            }
        } else {
            warn!(
                queue = %config.queue,
                message_id = %message_id,
                dequeue_count = dequeue_count,
                max_dequeue_count = config.max_dequeue_count,
                error = %reason,
                "Handler failed; message will be redelivered after its visibility timeout"
            );
        }
    }
}
