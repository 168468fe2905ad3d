//! Table management for record kinds.
//!
//! Each record kind gets one table holding the id and the JSON document:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS "user" (id TEXT PRIMARY KEY, resource JSONB NOT NULL);
//! CREATE UNIQUE INDEX IF NOT EXISTS "user_email_key" ON "user" ((resource->>'email'));
//! ```
//!
//! Unique fields are enforced by expression indexes named `<table>_<field>_key`,
//! which lets unique violations be mapped back to the offending field.

use std::sync::Arc;

use dashmap::DashSet;
use sqlx_postgres::PgPool;
use tracing::{debug, info, instrument};

use crate::error::{PostgresError, Result};

#[derive(Debug, Clone)]
pub struct SchemaManager {
    pool: PgPool,
    created_tables: Arc<DashSet<String>>,
}

impl SchemaManager {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            created_tables: Arc::new(DashSet::new()),
        }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Converts a record kind to a table name: lowercase ASCII letters, digits and `_`.
    pub fn table_name(kind: &str) -> Result<String> {
        let table = kind.to_ascii_lowercase();
        let valid = !table.is_empty()
            && table
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
            && !table.starts_with(|c: char| c.is_ascii_digit());
        if valid {
            Ok(table)
        } else {
            Err(PostgresError::schema(format!(
                "record kind '{kind}' is not a valid table name"
            )))
        }
    }

    /// Name of the unique index guarding `field` on `table`.
    #[must_use]
    pub fn unique_index_name(table: &str, field: &str) -> String {
        format!("{table}_{field}_key")
    }

    /// Field guarded by a unique index, recovered from its name.
    #[must_use]
    pub fn field_for_index<'a>(table: &str, index: &'a str) -> Option<&'a str> {
        index
            .strip_prefix(table)?
            .strip_prefix('_')?
            .strip_suffix("_key")
    }

    /// Ensures the table and its unique indexes exist. Idempotent and cached.
    #[instrument(skip(self, unique_fields), fields(kind = %kind))]
    pub async fn ensure_table(&self, kind: &str, unique_fields: &[&str]) -> Result<String> {
        let table = Self::table_name(kind)?;
        if self.created_tables.contains(&table) {
            debug!(table = %table, "table found in cache");
            return Ok(table);
        }

        info!(table = %table, "creating record table");
        let create = format!(
            r#"CREATE TABLE IF NOT EXISTS "{table}" (id TEXT PRIMARY KEY, resource JSONB NOT NULL)"#
        );
        sqlx_core::query::query(&create).execute(&self.pool).await?;

        for field in unique_fields {
            if field.contains(['\'', '"']) {
                return Err(PostgresError::schema(format!(
                    "unique field '{field}' contains quotes"
                )));
            }
            let index = Self::unique_index_name(&table, field);
            let sql = format!(
                r#"CREATE UNIQUE INDEX IF NOT EXISTS "{index}" ON "{table}" ((resource->>'{field}'))"#
            );
            sqlx_core::query::query(&sql).execute(&self.pool).await?;
        }

        self.created_tables.insert(table.clone());
        Ok(table)
    }
}
