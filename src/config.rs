use std::time::Duration;

use clap::Args;

pub const DEFAULT_DATABASE: &str = "simplebank.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;

/// Database connection settings. Every field can also come from the environment.
#[derive(Debug, Clone, Args)]
pub struct DatabaseConfig {
    /// Database file path or sqlite: URL
    #[arg(short, long, env = "DB_SOURCE", default_value = DEFAULT_DATABASE)]
    pub database: String,

    /// Maximum number of pooled connections
    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = DEFAULT_MAX_CONNECTIONS)]
    pub max_connections: u32,

    /// How long a statement waits on a locked database before failing (ms)
    #[arg(long, env = "DB_BUSY_TIMEOUT_MS", default_value_t = DEFAULT_BUSY_TIMEOUT_MS)]
    pub busy_timeout_ms: u64,

    /// How long to wait for a free pooled connection (ms)
    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_MS", default_value_t = DEFAULT_ACQUIRE_TIMEOUT_MS)]
    pub acquire_timeout_ms: u64,

    /// Abort and roll back transactions running longer than this (ms)
    #[arg(long, env = "TX_TIMEOUT_MS")]
    pub tx_timeout_ms: Option<u64>,
}

impl DatabaseConfig {
    /// Default settings for a database at `path`.
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            database: path.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            tx_timeout_ms: None,
        }
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn tx_timeout(&self) -> Option<Duration> {
        self.tx_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::for_path(DEFAULT_DATABASE)
    }
}

/// Logging settings.
#[derive(Debug, Clone, Args)]
pub struct LogConfig {
    /// Log filter directive (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long, env = "LOG_JSON")]
    pub log_json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_json: false,
        }
    }
}
