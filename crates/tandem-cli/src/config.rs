use serde::{Deserialize, Serialize};
use tandem_cache::{CacheConfig, RedisConfig};
use tandem_core::EntityScope;
use tandem_db_postgres::PostgresConfig;
use tandem_users::{SecurityConfig, UserStoreLabels};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis cache backend; disabled means the in-memory cache
    #[serde(default)]
    pub redis: RedisConfig,
    /// Cache-aside behavior and operation overrides
    #[serde(default)]
    pub cache: CacheConfig,
    /// Store labels and the secondary backend
    #[serde(default)]
    pub stores: StoresConfig,
    /// Used when `stores.secondary_backend = "postgres"`
    #[serde(default)]
    pub postgres: PostgresConfig,
    /// Password hashing parameters
    #[serde(default)]
    pub security: SecurityConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        self.logging.validate()?;
        self.redis.validate()?;
        self.cache.validate()?;
        self.stores.validate()?;
        if self.stores.secondary_backend == SecondaryBackend::Postgres {
            self.postgres.validate()?;
        }
        self.security.validate()?;
        Ok(())
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), String> {
        if LOG_LEVELS.contains(&self.level.to_ascii_lowercase().as_str()) {
            Ok(())
        } else {
            Err(format!(
                "logging.level must be one of {}, got '{}'",
                LOG_LEVELS.join(", "),
                self.level
            ))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SecondaryBackend {
    #[default]
    Memory,
    Postgres,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoresConfig {
    #[serde(default = "default_primary")]
    pub primary: String,
    #[serde(default = "default_secondary")]
    pub secondary: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default)]
    pub secondary_backend: SecondaryBackend,
}

fn default_primary() -> String {
    UserStoreLabels::default().primary
}

fn default_secondary() -> String {
    UserStoreLabels::default().secondary
}

fn default_namespace() -> String {
    UserStoreLabels::default().namespace
}

impl Default for StoresConfig {
    fn default() -> Self {
        Self {
            primary: default_primary(),
            secondary: default_secondary(),
            namespace: default_namespace(),
            secondary_backend: SecondaryBackend::default(),
        }
    }
}

impl StoresConfig {
    pub fn labels(&self) -> UserStoreLabels {
        UserStoreLabels {
            primary: self.primary.clone(),
            secondary: self.secondary.clone(),
            namespace: self.namespace.clone(),
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.primary == self.secondary {
            return Err("stores.primary and stores.secondary must differ".into());
        }
        for store in [&self.primary, &self.secondary] {
            EntityScope::new(store.as_str(), self.namespace.as_str(), "user")
                .map_err(|e| format!("stores: {e}"))?;
        }
        Ok(())
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub const DEFAULT_CONFIG_PATH: &str = "tandem.toml";

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        match path {
            Some(p) => {
                let pathbuf = PathBuf::from(p);
                if !pathbuf.exists() {
                    return Err(format!("config file not found: {p}"));
                }
                builder = builder.add_source(File::from(pathbuf));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if default_path.exists() {
                    builder = builder.add_source(File::from(default_path));
                }
            }
        }
        // Environment variable overrides, e.g., TANDEM__REDIS__URL=redis://cache:6379
        builder = builder.add_source(
            Environment::with_prefix("TANDEM")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}
