//! Polling configuration and settings loading

use serde::Deserialize;
use std::time::Duration;

use conveyor_core::MAX_RECEIVE_BATCH;

/// Per-queue polling policy.
///
/// The queue name is the policy's identity: the engine allows at most one
/// active poll loop per name.
#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub queue: String,
    /// Minimum idle gap between the end of one poll iteration and the next.
    pub poll_interval: Duration,
    /// How long a received message stays hidden before it is redelivered.
    pub visibility_timeout: Duration,
    /// Messages requested per receive, clamped to 1..=[`MAX_RECEIVE_BATCH`].
    pub max_messages: u32,
    /// Dequeue count at which a failing message is removed instead of retried.
    pub max_dequeue_count: u32,
}

impl PollingConfig {
    pub fn new(queue: impl Into<String>) -> Self {
        Self {
            queue: queue.into(),
            poll_interval: Duration::from_millis(default_poll_interval_ms()),
            visibility_timeout: Duration::from_secs(default_visibility_timeout_secs()),
            max_messages: default_max_messages(),
            max_dequeue_count: default_max_dequeue_count(),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_visibility_timeout(mut self, timeout: Duration) -> Self {
        self.visibility_timeout = timeout;
        self
    }

    pub fn with_max_messages(mut self, max_messages: u32) -> Self {
        self.max_messages = max_messages;
        self
    }

    pub fn with_max_dequeue_count(mut self, max_dequeue_count: u32) -> Self {
        self.max_dequeue_count = max_dequeue_count;
        self
    }

    /// Clamp `max_messages` into the range transports accept.
    pub fn normalized(mut self) -> Self {
        self.max_messages = self.max_messages.clamp(1, MAX_RECEIVE_BATCH);
        self
    }
}

/// Worker configuration as loaded from file and environment.
#[derive(Debug, Deserialize, Default)]
pub struct WorkerSettings {
    #[serde(default)]
    pub defaults: PollingDefaults,

    #[serde(default)]
    pub queues: Vec<QueueSettings>,
}

/// Polling values applied to queues that do not override them.
#[derive(Debug, Deserialize)]
pub struct PollingDefaults {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    #[serde(default = "default_max_messages")]
    pub max_messages: u32,

    #[serde(default = "default_max_dequeue_count")]
    pub max_dequeue_count: u32,
}

impl Default for PollingDefaults {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            max_messages: default_max_messages(),
            max_dequeue_count: default_max_dequeue_count(),
        }
    }
}

/// One queue's entry in the settings file.
#[derive(Debug, Deserialize)]
pub struct QueueSettings {
    pub queue: String,
    pub poll_interval_ms: Option<u64>,
    pub visibility_timeout_secs: Option<u64>,
    pub max_messages: Option<u32>,
    pub max_dequeue_count: Option<u32>,
}

impl QueueSettings {
    /// Lower the file representation onto the shared defaults.
    pub fn polling_config(&self, defaults: &PollingDefaults) -> PollingConfig {
        PollingConfig::new(self.queue.clone())
            .with_poll_interval(Duration::from_millis(
                self.poll_interval_ms.unwrap_or(defaults.poll_interval_ms),
            ))
            .with_visibility_timeout(Duration::from_secs(
                self.visibility_timeout_secs
                    .unwrap_or(defaults.visibility_timeout_secs),
            ))
            .with_max_messages(self.max_messages.unwrap_or(defaults.max_messages))
            .with_max_dequeue_count(
                self.max_dequeue_count.unwrap_or(defaults.max_dequeue_count),
            )
            .normalized()
    }
}

fn default_poll_interval_ms() -> u64 {
    5000
}

fn default_visibility_timeout_secs() -> u64 {
    30
}

fn default_max_messages() -> u32 {
    1
}

fn default_max_dequeue_count() -> u32 {
    5
}

impl WorkerSettings {
    /// Load settings from file and environment
    pub fn load() -> anyhow::Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name("conveyor").required(false))
            .add_source(config::Environment::with_prefix("CONVEYOR"))
            .build()?;

        Ok(settings.try_deserialize::<WorkerSettings>()?)
    }

    /// Polling config for a named queue, if the settings declare it.
    pub fn queue(&self, name: &str) -> Option<PollingConfig> {
        self.queues
            .iter()
            .find(|q| q.queue == name)
            .map(|q| q.polling_config(&self.defaults))
    }
}
