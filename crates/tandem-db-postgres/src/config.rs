//! Connection settings for the record tables.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Where the record tables live and how many connections the stores share.
///
/// Every field has a default, so a config section may name only `url`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgresConfig {
    /// `postgres://` or `postgresql://` URL of the database holding the record tables.
    pub url: String,

    /// Connections shared by every record store opened with this config.
    pub pool_size: u32,

    /// How long a store call waits for a free connection, in milliseconds.
    pub acquire_timeout_ms: u64,

    /// Idle connections are closed after this many seconds. 0 keeps them open.
    pub idle_timeout_secs: u64,

    /// Create the record table and its unique indexes on connect.
    pub ensure_schema: bool,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/tandem".into(),
            pool_size: 5,
            acquire_timeout_ms: 3_000,
            idle_timeout_secs: 600,
            ensure_schema: true,
        }
    }
}

impl PostgresConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.pool_size = size;
        self
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.url.starts_with("postgres://") && !self.url.starts_with("postgresql://") {
            return Err(format!(
                "postgres.url must use the postgres scheme: {}",
                crate::pool::redact_url(&self.url)
            ));
        }
        if self.pool_size == 0 {
            return Err("postgres.pool_size must be greater than zero".into());
        }
        if self.acquire_timeout_ms == 0 {
            return Err("postgres.acquire_timeout_ms must be greater than zero".into());
        }
        Ok(())
    }
}
