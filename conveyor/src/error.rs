//! Worker error types

use thiserror::Error;

use conveyor_core::TransportError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Already polling queue: {0}")]
    AlreadyPolling(String),

    #[error("No handler registered for queue: {0}")]
    NotRegistered(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
