//! Message handler trait

use async_trait::async_trait;
use std::future::Future;

use crate::message::Message;

/// Application-level failure from a message handler.
///
/// Drives the retry/poison policy; the engine logs it and never returns it
/// to callers.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Asynchronous message processor bound to a queue.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Process one delivery. `Err` leaves the message for redelivery, or
    /// removes it once its dequeue count reaches the configured limit.
    async fn handle(&self, message: Message) -> Result<(), HandlerError>;
}

/// Any `Fn(Message) -> Future<Output = Result<(), HandlerError>>` closure
/// is a handler.
#[async_trait]
impl<F, Fut> MessageHandler for F
where
    F: Fn(Message) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, message: Message) -> Result<(), HandlerError> {
        (self)(message).await
    }
}
