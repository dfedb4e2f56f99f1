//! Server configuration types.

use crate::db::DbConfig;
use crate::score::RetryPolicy;
use serde::{Deserialize, Serialize};
use std::net::{AddrParseError, SocketAddr};
use std::time::Duration;

/// Main server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration.
    #[serde(default)]
    pub server: ServerBindConfig,
    /// Backing store configuration.
    #[serde(default)]
    pub database: DbConfig,
    /// Fast store configuration.
    #[serde(default)]
    pub fast_store: FastStoreConfig,
    /// Optimistic counter update bounds.
    #[serde(default)]
    pub occ: RetryPolicy,
    /// Write-behind queue configuration.
    #[serde(default)]
    pub write_behind: WriteBehindConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Load configuration from defaults, `CONFIG_PATH` and the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        super::loader::load_config()
    }

    /// Configuration with both stores held in memory.
    pub fn in_memory() -> Self {
        Self {
            database: DbConfig::in_memory(),
            fast_store: FastStoreConfig {
                backend: StoreBackend::Memory,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        self.server.socket_addr()
    }
}

/// Server binding configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerBindConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Request timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum request body size.
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_request_timeout() -> u64 {
    30
}

fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerBindConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

impl ServerBindConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Fast store backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

/// Fast store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastStoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// How often the memory backend purges expired keys.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

fn default_redis_url() -> String {
    "redis://127.0.0.1:6379".to_string()
}

fn default_sweep_interval() -> u64 {
    30
}

impl Default for FastStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            url: default_redis_url(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// Write-behind queue configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteBehindConfig {
    /// Jobs that may wait in the queue before updates are refused.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Recent failures kept for inspection.
    #[serde(default = "default_failure_log_size")]
    pub failure_log_size: usize,
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_failure_log_size() -> usize {
    32
}

impl Default for WriteBehindConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            failure_log_size: default_failure_log_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json or pretty).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}
