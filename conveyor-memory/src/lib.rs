//! In-memory queue transport for Conveyor
//!
//! Provides a complete [`conveyor_core::QueueTransport`] backend with:
//! - Per-queue FIFO delivery
//! - Visibility timeouts with receipt-handle rotation
//! - Dequeue counting across redeliveries
//! - Message expiry

mod transport;

pub use transport::MemoryTransport;
