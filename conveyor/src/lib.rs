//! Queue polling and dispatch engine
//!
//! Conveyor polls durable queues and feeds their messages to registered
//! async handlers:
//! - One independent, cancellable poll loop per queue
//! - Sequential dispatch within a loop, with delete-on-success settlement
//! - Redelivery via visibility timeout on failure
//! - Poison-message removal once a dequeue-count threshold is reached
//!
//! The queue itself sits behind the [`QueueTransport`] trait; pair the
//! engine with `conveyor-memory` or any other backend.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod poller;
pub mod registry;
pub mod worker;

pub use config::{PollingConfig, PollingDefaults, QueueSettings, WorkerSettings};
pub use dispatch::Dispatcher;
pub use error::WorkerError;
pub use poller::Poller;
pub use registry::{HandlerRegistry, Registration};
pub use worker::Worker;

pub use conveyor_core::{
    HandlerError, Message, MessageHandler, QueueTransport, TransportError, MAX_RECEIVE_BATCH,
};
