//! Core types and traits for Conveyor
//!
//! This crate provides the message model and the two seams shared by the
//! polling engine, queue backends, and hosting applications: the transport
//! trait a backend implements and the handler trait a host implements.

pub mod handler;
pub mod message;
pub mod transport;

pub use handler::{HandlerError, MessageHandler};
pub use message::Message;
pub use transport::{validate_queue_name, QueueTransport, TransportError, MAX_RECEIVE_BATCH};
