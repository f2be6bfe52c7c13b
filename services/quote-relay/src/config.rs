//! Configuration for the quote relay

use crate::error::RelayError;
use crate::state::OutboundSettings;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use types::numeric::MAX_DISPLAY_DP;

/// Quote relay configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    /// WebSocket server configuration
    pub server: ServerConfig,
    /// Upstream quote feed and presentation settings
    pub data_source: DataSourceConfig,
    /// Sample store connection
    pub postgres: PostgresConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Frames buffered per client before it is disconnected
    #[serde(default = "default_send_queue_capacity")]
    pub send_queue_capacity: usize,
    /// Per-delivery timeout in seconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout: u64,
}

/// Upstream feed configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DataSourceConfig {
    /// Quote feed URL
    pub url: String,
    /// Polling cadence in seconds
    pub refresh_rate: u64,
    /// Decimal places used when sending values to clients
    pub decimals: u32,
    /// Instruments seeded into the catalog at startup
    pub symbols: Vec<String>,
    /// Lookback window for the on-subscribe history, in minutes
    #[serde(default = "default_history_minutes")]
    pub history_minutes: u64,
    /// Upstream request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
}

/// PostgreSQL connection settings
#[derive(Debug, Clone, Deserialize)]
pub struct PostgresConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Maximum lifetime of a pooled connection in seconds
    #[serde(default = "default_pool_recycle")]
    pub pool_recycle: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// One year; longer lookbacks are rejected at load time.
pub const MAX_HISTORY_MINUTES: u64 = 60 * 24 * 365;

fn default_send_queue_capacity() -> usize {
    64
}

fn default_send_timeout() -> u64 {
    5
}

fn default_history_minutes() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    5
}

fn default_pool_recycle() -> u64 {
    3600
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RelayConfig {
    /// Load configuration from a file, then apply `RELAY__SECTION__KEY`
    /// environment overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, RelayError> {
        let settings = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("RELAY")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("data_source.symbols")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the relay cannot run with.
    pub fn validate(&self) -> Result<(), RelayError> {
        if self.data_source.refresh_rate == 0 {
            return Err(RelayError::Config(
                "data_source.refresh_rate must be positive".into(),
            ));
        }
        if self.data_source.symbols.is_empty() {
            return Err(RelayError::Config(
                "data_source.symbols must list at least one instrument".into(),
            ));
        }
        if self.data_source.decimals > MAX_DISPLAY_DP {
            return Err(RelayError::Config(format!(
                "data_source.decimals must be at most {}",
                MAX_DISPLAY_DP
            )));
        }
        if self.data_source.history_minutes > MAX_HISTORY_MINUTES {
            return Err(RelayError::Config(format!(
                "data_source.history_minutes must be at most {}",
                MAX_HISTORY_MINUTES
            )));
        }
        if self.server.send_queue_capacity == 0 || self.server.send_timeout == 0 {
            return Err(RelayError::Config(
                "server.send_queue_capacity and server.send_timeout must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Get server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl ServerConfig {
    pub fn outbound(&self) -> OutboundSettings {
        OutboundSettings {
            queue_capacity: self.send_queue_capacity,
            send_timeout: Duration::from_secs(self.send_timeout),
        }
    }
}

impl DataSourceConfig {
    pub fn cadence(&self) -> Duration {
        Duration::from_secs(self.refresh_rate)
    }

    pub fn history_window(&self) -> Duration {
        Duration::from_secs(self.history_minutes.saturating_mul(60))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }
}

impl PostgresConfig {
    pub fn connect_url(&self) -> String {
        format!(
            "postgresql://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.pool_recycle)
    }
}
