use std::marker::PhantomData;

use async_trait::async_trait;
use serde_json::Value;
use sqlx_core::error::Error as SqlxError;
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use tandem_storage::{Record, RecordStore, StorageError, StorageResult, merge_patch};
use tracing::{debug, instrument};

use crate::config::PostgresConfig;
use crate::error::{PostgresError, unique_violation};
use crate::pool::create_pool;
use crate::schema::SchemaManager;

/// PostgreSQL record store: one table per record kind, documents kept as JSONB.
#[derive(Debug, Clone)]
pub struct PostgresRecordStore<R> {
    pool: PgPool,
    table: String,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> PostgresRecordStore<R> {
    /// Connects using `config`, creating the table when `ensure_schema` is set.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PostgresError> {
        let pool = create_pool(config).await?;
        Self::open(pool, config.ensure_schema).await
    }

    /// Wraps an existing pool.
    pub async fn open(pool: PgPool, ensure_schema: bool) -> Result<Self, PostgresError> {
        let table = if ensure_schema {
            SchemaManager::new(pool.clone())
                .ensure_table(R::KIND, R::UNIQUE_FIELDS)
                .await?
        } else {
            SchemaManager::table_name(R::KIND)?
        };
        Ok(Self {
            pool,
            table,
            _record: PhantomData,
        })
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    fn write_error(&self, err: SqlxError, id: &str, value: &Value) -> StorageError {
        let Some(constraint) = unique_violation(&err) else {
            return PostgresError::from(err).into();
        };
        let field = SchemaManager::field_for_index(&self.table, &constraint).unwrap_or("id");
        let taken = if field == "id" {
            id.to_string()
        } else {
            tandem_storage::field_text(value, field).unwrap_or_default()
        };
        StorageError::already_exists(R::KIND, field, taken)
    }

    fn decode_all(rows: Vec<(Value,)>) -> StorageResult<Vec<R>> {
        rows.into_iter().map(|(value,)| R::from_json(value)).collect()
    }
}

fn sql_error(err: SqlxError) -> StorageError {
    PostgresError::from(err).into()
}

#[async_trait]
impl<R: Record> RecordStore<R> for PostgresRecordStore<R> {
    #[instrument(skip(self), fields(table = %self.table))]
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<R>> {
        let sql = format!(r#"SELECT resource FROM "{}" WHERE id = $1"#, self.table);
        let row: Option<(Value,)> = query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;
        row.map(|(value,)| R::from_json(value)).transpose()
    }

    #[instrument(skip(self), fields(table = %self.table))]
    async fn find_by_field(&self, field: &str, value: &str) -> StorageResult<Option<R>> {
        let sql = format!(
            r#"SELECT resource FROM "{}" WHERE resource->>$1 = $2 ORDER BY id LIMIT 1"#,
            self.table
        );
        let row: Option<(Value,)> = query_as(&sql)
            .bind(field)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(sql_error)?;
        row.map(|(value,)| R::from_json(value)).transpose()
    }

    async fn find_all(&self) -> StorageResult<Vec<R>> {
        let sql = format!(r#"SELECT resource FROM "{}" ORDER BY id"#, self.table);
        let rows: Vec<(Value,)> = query_as(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(sql_error)?;
        Self::decode_all(rows)
    }

    async fn create(&self, mut record: R) -> StorageResult<R> {
        let id = match record.id() {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record.set_id(id.clone());
                id
            }
        };
        let value = record.to_json()?;

        let sql = format!(
            r#"INSERT INTO "{}" (id, resource) VALUES ($1, $2)"#,
            self.table
        );
        query(&sql)
            .bind(&id)
            .bind(&value)
            .execute(&self.pool)
            .await
            .map_err(|e| self.write_error(e, &id, &value))?;

        debug!(kind = R::KIND, id = %id, "record created");
        Ok(record)
    }

    async fn update(&self, id: &str, patch: &Value) -> StorageResult<R> {
        let mut tx = self.pool.begin().await.map_err(sql_error)?;

        let select = format!(
            r#"SELECT resource FROM "{}" WHERE id = $1 FOR UPDATE"#,
            self.table
        );
        let row: Option<(Value,)> = query_as(&select)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(sql_error)?;
        let (mut value,) = row.ok_or_else(|| StorageError::not_found(R::KIND, id))?;

        merge_patch(&mut value, patch);
        if let Value::Object(map) = &mut value {
            map.insert(R::ID_FIELD.to_string(), Value::String(id.to_string()));
        }
        let record = R::from_json(value.clone())?;

        let update = format!(r#"UPDATE "{}" SET resource = $2 WHERE id = $1"#, self.table);
        query(&update)
            .bind(id)
            .bind(&value)
            .execute(&mut *tx)
            .await
            .map_err(|e| self.write_error(e, id, &value))?;
        tx.commit().await.map_err(sql_error)?;

        Ok(record)
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let sql = format!(r#"DELETE FROM "{}" WHERE id = $1"#, self.table);
        let result = query(&sql)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(sql_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn save(&self, record: R) -> StorageResult<R> {
        let id = record
            .id()
            .ok_or_else(|| StorageError::invalid_record(format!("{} has no id", R::KIND)))?
            .to_string();
        let value = record.to_json()?;

        let sql = format!(
            r#"INSERT INTO "{}" (id, resource) VALUES ($1, $2)
               ON CONFLICT (id) DO UPDATE SET resource = EXCLUDED.resource"#,
            self.table
        );
        query(&sql)
            .bind(&id)
            .bind(&value)
            .execute(&self.pool)
            .await
            .map_err(|e| self.write_error(e, &id, &value))?;
        Ok(record)
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
