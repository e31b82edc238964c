//! Test utilities for Conveyor
//!
//! Instrumentation for exercising the polling engine end to end: an
//! ordered event log shared between fixtures and assertions, a transport
//! wrapper that records calls and injects failures, and canned handlers.

pub mod handlers;
pub mod transport;

use parking_lot::Mutex;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub use handlers::{BlockingHandler, FailingHandler, MarkerRoutedHandler, SucceedingHandler};
pub use transport::RecordingTransport;

/// Ordered record of engine activity.
///
/// Handlers push `handle:<body>#<dequeue_count>` events and
/// [`RecordingTransport`] pushes one event per transport call, so a test
/// can assert on the exact interleaving of handling and settlement.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().push(event.into());
    }

    /// Snapshot of all events in arrival order.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().clone()
    }

    /// Events starting with `prefix`, in arrival order.
    pub fn with_prefix(&self, prefix: &str) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .cloned()
            .collect()
    }

    /// Number of events starting with `prefix`.
    pub fn count_prefix(&self, prefix: &str) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|event| event.starts_with(prefix))
            .count()
    }

    /// Index of the first event equal to `event`, if it was recorded.
    pub fn position(&self, event: &str) -> Option<usize> {
        self.events.lock().iter().position(|e| e == event)
    }
}

/// Unique queue name so concurrent tests never share a queue.
pub fn unique_queue(prefix: &str) -> String {
    format!("{}-{:08x}", prefix, rand::random::<u32>())
}

/// Install a tracing subscriber honoring `RUST_LOG`; safe to call from
/// every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conveyor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
