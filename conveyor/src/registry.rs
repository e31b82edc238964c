//! Handler registration

use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use conveyor_core::MessageHandler;

use crate::config::PollingConfig;

/// A queue's handler and polling policy.
#[derive(Clone)]
pub struct Registration {
    pub config: PollingConfig,
    pub handler: Arc<dyn MessageHandler>,
}

/// Queue-name keyed handler registrations.
///
/// Populated during host startup. `start` resolves entries at call time, so
/// replacing a registration before `start` takes effect, while a loop that
/// is already running keeps the registration it started with until it is
/// stopped and started again.
#[derive(Default)]
pub struct HandlerRegistry {
    entries: DashMap<String, Arc<Registration>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a registration under its queue name, replacing any previous one.
    pub fn register(&self, config: PollingConfig, handler: Arc<dyn MessageHandler>) {
        let queue = config.queue.clone();
        let previous = self
            .entries
            .insert(queue.clone(), Arc::new(Registration { config, handler }));

        if previous.is_some() {
            warn!(queue = %queue, "Replaced existing handler registration");
        } else {
            debug!(queue = %queue, "Registered handler");
        }
    }

    /// Registration for a queue, if one exists.
    pub fn lookup(&self, queue: &str) -> Option<Arc<Registration>> {
        self.entries.get(queue).map(|entry| entry.value().clone())
    }

    /// Registered queue names, sorted.
    pub fn queue_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }
}
