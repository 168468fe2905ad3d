//! CachedRecordStore - a record store wrapper that routes calls through the cache.
//!
//! Every method resolves its [`OperationSpec`] from the component's
//! [`OperationTable`] and hands the inner call to [`CacheAside::call`].
//! Reads the table marks cacheable are served from the cache; writes
//! invalidate the scope after the inner call succeeds.
//!
//! # Example
//!
//! ```ignore
//! let table = OperationTable::new(scope.clone())
//!     .with(OperationSpec::read(scope.clone(), ops::FIND_BY_ID)?.cacheable())?
//!     .with(OperationSpec::write(scope.clone(), ops::UPDATE)?)?;
//! let users = CachedRecordStore::new(postgres_users, cache, table);
//! ```

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tandem_cache::CacheAside;
use tandem_core::{CallArgs, EntityScope, OperationSpec, OperationTable, call_args};

use crate::error::StorageResult;
use crate::record::Record;
use crate::store::{RecordStore, ops};

/// A [`RecordStore`] decorator adding cache-aside behavior.
pub struct CachedRecordStore<R, S> {
    inner: S,
    cache: Arc<CacheAside>,
    table: OperationTable,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record, S: RecordStore<R>> CachedRecordStore<R, S> {
    pub fn new(inner: S, cache: Arc<CacheAside>, table: OperationTable) -> Self {
        Self {
            inner,
            cache,
            table,
            _record: PhantomData,
        }
    }

    /// The undecorated store.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn cache(&self) -> &Arc<CacheAside> {
        &self.cache
    }

    pub fn table(&self) -> &OperationTable {
        &self.table
    }

    pub fn scope(&self) -> &Arc<EntityScope> {
        self.table.scope()
    }

    fn spec(&self, name: &str) -> StorageResult<OperationSpec> {
        Ok(self.table.resolve(name)?)
    }
}

#[async_trait]
impl<R: Record, S: RecordStore<R>> RecordStore<R> for CachedRecordStore<R, S> {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<R>> {
        let op = self.spec(ops::FIND_BY_ID)?;
        self.cache
            .call(&op, &call_args![id], || self.inner.find_by_id(id))
            .await
    }

    async fn find_by_field(&self, field: &str, value: &str) -> StorageResult<Option<R>> {
        let op = self.spec(&ops::find_by_field(field))?;
        self.cache
            .call(&op, &call_args![value], || self.inner.find_by_field(field, value))
            .await
    }

    async fn find_all(&self) -> StorageResult<Vec<R>> {
        let op = self.spec(ops::FIND_ALL)?;
        self.cache
            .call(&op, &CallArgs::new(), || self.inner.find_all())
            .await
    }

    async fn create(&self, record: R) -> StorageResult<R> {
        let op = self.spec(ops::CREATE)?;
        let args = call_args![&record];
        self.cache
            .call(&op, &args, || self.inner.create(record))
            .await
    }

    async fn update(&self, id: &str, patch: &Value) -> StorageResult<R> {
        let op = self.spec(ops::UPDATE)?;
        self.cache
            .call(&op, &call_args![id, patch], || self.inner.update(id, patch))
            .await
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let op = self.spec(ops::DELETE)?;
        self.cache
            .call(&op, &call_args![id], || self.inner.delete(id))
            .await
    }

    async fn save(&self, record: R) -> StorageResult<R> {
        let op = self.spec(ops::SAVE)?;
        let args = call_args![&record];
        self.cache
            .call(&op, &args, || self.inner.save(record))
            .await
    }

    fn backend_name(&self) -> &'static str {
        self.inner.backend_name()
    }
}
