//! The connection pool shared by record stores.

use sqlx_core::pool::PoolOptions;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgPool, Postgres};
use tracing::{info, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, Result};

/// Opens the pool the record stores of one database share.
#[instrument(skip(config), fields(url = %redact_url(&config.url)))]
pub async fn create_pool(config: &PostgresConfig) -> Result<PgPool> {
    config.validate().map_err(PostgresError::config)?;

    let pool = PoolOptions::<Postgres>::new()
        .max_connections(config.pool_size)
        .acquire_timeout(config.acquire_timeout())
        .idle_timeout(config.idle_timeout())
        .connect(&config.url)
        .await?;

    info!(pool_size = config.pool_size, "record store pool ready");
    Ok(pool)
}

/// Round-trips one query and returns the server version.
#[instrument(skip(pool))]
pub async fn server_version(pool: &PgPool) -> Result<String> {
    let (version,): (String,) = query_as("SELECT current_setting('server_version')")
        .fetch_one(pool)
        .await?;
    Ok(version)
}

/// Replaces the password of a connection URL with `****` for logs and messages.
pub fn redact_url(url: &str) -> String {
    let Some(at) = url.rfind('@') else {
        return url.to_string();
    };
    let userinfo_start = url.find("://").map_or(0, |p| p + 3);
    match url[userinfo_start..at].find(':') {
        Some(offset) => {
            let colon = userinfo_start + offset;
            format!("{}:****{}", &url[..colon], &url[at..])
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redact_url() {
        assert_eq!(
            redact_url("postgres://tandem:secret@db:5432/tandem"),
            "postgres://tandem:****@db:5432/tandem"
        );
        assert_eq!(redact_url("redis://:secret@cache:6379"), "redis://:****@cache:6379");
        assert_eq!(redact_url("postgres://tandem@db/tandem"), "postgres://tandem@db/tandem");
        assert_eq!(redact_url("postgres://db/tandem"), "postgres://db/tandem");
    }

    #[test]
    fn test_redact_url_with_at_in_password() {
        assert_eq!(
            redact_url("postgres://tandem:p@ss@db/tandem"),
            "postgres://tandem:****@db/tandem"
        );
    }
}
