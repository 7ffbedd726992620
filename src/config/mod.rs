mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, PersistenceSettings, RetrySettings, ServerSettings, Settings,
};

/// Loads the configuration from the default file and environment variables.
///
/// Environment keys use the `SHARDSUB_` prefix and `__` between section and
/// field, e.g. `SHARDSUB_BROKER__PARTITIONS=4`. Whatever is missing is taken
/// from `Settings::default()`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("SHARDSUB")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    // Merge with defaults
    let default = Settings::default();

    let server = partial.server.as_ref();
    let broker = partial.broker.as_ref();
    let retry = partial.retry.as_ref();
    let persistence = partial.persistence.as_ref();

    Ok(Settings {
        server: ServerSettings {
            host: server
                .and_then(|s| s.host.clone())
                .unwrap_or(default.server.host),
            port: server.and_then(|s| s.port).unwrap_or(default.server.port),
        },
        broker: BrokerSettings {
            key_range: broker
                .and_then(|b| b.key_range)
                .unwrap_or(default.broker.key_range),
            partitions: broker
                .and_then(|b| b.partitions)
                .unwrap_or(default.broker.partitions),
            queue_capacity: broker
                .and_then(|b| b.queue_capacity)
                .unwrap_or(default.broker.queue_capacity),
            delivery_timeout_ms: broker
                .and_then(|b| b.delivery_timeout_ms)
                .unwrap_or(default.broker.delivery_timeout_ms),
        },
        retry: RetrySettings {
            base_delay_ms: retry
                .and_then(|r| r.base_delay_ms)
                .unwrap_or(default.retry.base_delay_ms),
            max_retries: retry
                .and_then(|r| r.max_retries)
                .unwrap_or(default.retry.max_retries),
            max_delay_ms: retry
                .and_then(|r| r.max_delay_ms)
                .unwrap_or(default.retry.max_delay_ms),
        },
        persistence: PersistenceSettings {
            enabled: persistence
                .and_then(|p| p.enabled)
                .unwrap_or(default.persistence.enabled),
            path: persistence
                .and_then(|p| p.path.clone())
                .unwrap_or(default.persistence.path),
            batch_threshold: persistence
                .and_then(|p| p.batch_threshold)
                .unwrap_or(default.persistence.batch_threshold),
            flush_attempts: persistence
                .and_then(|p| p.flush_attempts)
                .unwrap_or(default.persistence.flush_attempts),
        },
    })
}

#[cfg(test)]
mod tests;
