//! Configuration validation.

use super::types::ServerConfig;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid database URL")]
    InvalidDatabaseUrl,

    #[error("Invalid fast store URL: {0}")]
    InvalidFastStoreUrl(String),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid port: {0}")]
    InvalidPort(u16),

    #[error("Optimistic updates need at least one attempt")]
    InvalidRetryPolicy,

    #[error("Write-behind queue capacity must be positive")]
    InvalidQueueCapacity,

    #[error("Invalid log level: {0}")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}")]
    InvalidLogFormat(String),
}

/// Validate server configuration.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if !config.database.url.starts_with("sqlite:") {
        errors.push(ConfigError::InvalidDatabaseUrl);
    }

    if config.fast_store.backend == super::StoreBackend::Redis
        && !(config.fast_store.url.starts_with("redis://")
            || config.fast_store.url.starts_with("rediss://")
            || config.fast_store.url.starts_with("redis+unix://"))
    {
        errors.push(ConfigError::InvalidFastStoreUrl(config.fast_store.url.clone()));
    }

    if config.server.port == 0 {
        errors.push(ConfigError::InvalidPort(0));
    } else if config.socket_addr().is_err() {
        errors.push(ConfigError::InvalidBindAddress(config.server.host.clone()));
    }

    if config.occ.max_attempts == 0 {
        errors.push(ConfigError::InvalidRetryPolicy);
    }

    if config.write_behind.queue_capacity == 0 {
        errors.push(ConfigError::InvalidQueueCapacity);
    }

    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.logging.level.to_lowercase().as_str()) {
        errors.push(ConfigError::InvalidLogLevel(config.logging.level.clone()));
    }

    if !matches!(config.logging.format.as_str(), "pretty" | "json") {
        errors.push(ConfigError::InvalidLogFormat(config.logging.format.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
