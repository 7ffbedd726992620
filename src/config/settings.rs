use serde::Deserialize;
use std::time::Duration;

use crate::utils::error::{BrokerError, BrokerResult};

/// Top-level configuration settings for the application.
///
/// Every value is fixed once the broker starts.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Settings {
    pub server: ServerSettings,
    pub broker: BrokerSettings,
    pub retry: RetrySettings,
    pub persistence: PersistenceSettings,
}

/// Configuration settings for the ingress server.
///
/// Defines the host and port the server will bind to.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// Partitioning and worker queue settings.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct BrokerSettings {
    /// Size of the hash space `[0, key_range)`.
    pub key_range: u64,
    /// Number of partitions, and therefore worker tasks.
    pub partitions: usize,
    /// Capacity of each partition's inbound queue.
    pub queue_capacity: usize,
    pub delivery_timeout_ms: u64,
}

/// Backoff policy for failed deliveries.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RetrySettings {
    /// One backoff "time unit"; retry `n` waits `base_delay_ms * 2^n`.
    pub base_delay_ms: u64,
    pub max_retries: u32,
    pub max_delay_ms: u64,
}

/// Configuration for the batched persistence sink.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct PersistenceSettings {
    pub enabled: bool,
    pub path: String,
    pub batch_threshold: usize,
    pub flush_attempts: u32,
}

/// Partial configuration settings loaded from files or environment.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub server: Option<PartialServerSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub retry: Option<PartialRetrySettings>,
    pub persistence: Option<PartialPersistenceSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialServerSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub key_range: Option<u64>,
    pub partitions: Option<usize>,
    pub queue_capacity: Option<usize>,
    pub delivery_timeout_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRetrySettings {
    pub base_delay_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialPersistenceSettings {
    pub enabled: Option<bool>,
    pub path: Option<String>,
    pub batch_threshold: Option<usize>,
    pub flush_attempts: Option<u32>,
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            broker: BrokerSettings {
                key_range: 1000,
                partitions: 10,
                queue_capacity: 100,
                delivery_timeout_ms: 5000,
            },
            retry: RetrySettings {
                base_delay_ms: 1000,
                max_retries: 8,
                max_delay_ms: 300_000,
            },
            persistence: PersistenceSettings {
                enabled: true,
                path: "shardsub_db".to_string(),
                batch_threshold: 50,
                flush_attempts: 3,
            },
        }
    }
}

impl Settings {
    /// Rejects combinations the broker cannot start with.
    pub fn validate(&self) -> BrokerResult<()> {
        let invalid = |msg: &str| Err(BrokerError::InvalidConfig(msg.to_string()));

        if self.broker.partitions == 0 {
            return invalid("broker.partitions must be at least 1");
        }
        if self.broker.key_range < self.broker.partitions as u64 {
            return invalid("broker.key_range must be >= broker.partitions");
        }
        if self.broker.queue_capacity == 0 {
            return invalid("broker.queue_capacity must be at least 1");
        }
        if self.retry.base_delay_ms == 0 {
            return invalid("retry.base_delay_ms must be at least 1");
        }
        if self.persistence.batch_threshold == 0 {
            return invalid("persistence.batch_threshold must be at least 1");
        }
        Ok(())
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl BrokerSettings {
    pub fn delivery_timeout(&self) -> Duration {
        Duration::from_millis(self.delivery_timeout_ms)
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}
