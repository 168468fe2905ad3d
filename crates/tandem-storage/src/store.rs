//! The record store contract.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::record::Record;

/// Operation names used as the operation segment of cache keys.
pub mod ops {
    pub const FIND_BY_ID: &str = "findById";
    pub const FIND_ALL: &str = "findAll";
    pub const CREATE: &str = "create";
    pub const UPDATE: &str = "update";
    pub const DELETE: &str = "delete";
    pub const SAVE: &str = "save";

    /// `findBy` followed by the capitalized field name (`email` -> `findByEmail`).
    pub fn find_by_field(field: &str) -> String {
        let mut chars = field.chars();
        match chars.next() {
            Some(first) => format!("findBy{}{}", first.to_ascii_uppercase(), chars.as_str()),
            None => "findBy".to_string(),
        }
    }
}

/// Persistent storage for one record kind.
///
/// # Example
///
/// ```ignore
/// async fn load(store: &dyn RecordStore<User>, id: &str) -> StorageResult<User> {
///     store
///         .find_by_id(id)
///         .await?
///         .ok_or_else(|| StorageError::not_found(User::KIND, id))
/// }
/// ```
#[async_trait]
pub trait RecordStore<R: Record>: Send + Sync {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<R>>;

    /// First record whose `field` equals `value`.
    async fn find_by_field(&self, field: &str, value: &str) -> StorageResult<Option<R>>;

    async fn find_all(&self) -> StorageResult<Vec<R>>;

    /// Inserts a new record. The store assigns an id when the record has none.
    ///
    /// Fails with `AlreadyExists` if the id or a unique field is taken.
    async fn create(&self, record: R) -> StorageResult<R>;

    /// Applies a JSON merge patch to an existing record.
    ///
    /// Fails with `NotFound` for an unknown id and `AlreadyExists` if the
    /// patch would duplicate a unique field.
    async fn update(&self, id: &str, patch: &Value) -> StorageResult<R>;

    /// Removes a record. Returns `false` if there was nothing to remove.
    async fn delete(&self, id: &str) -> StorageResult<bool>;

    /// Inserts or replaces the record with the record's id.
    async fn save(&self, record: R) -> StorageResult<R>;

    fn backend_name(&self) -> &'static str;
}

#[async_trait]
impl<R: Record, S: RecordStore<R> + ?Sized> RecordStore<R> for Arc<S> {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<R>> {
        (**self).find_by_id(id).await
    }

    async fn find_by_field(&self, field: &str, value: &str) -> StorageResult<Option<R>> {
        (**self).find_by_field(field, value).await
    }

    async fn find_all(&self) -> StorageResult<Vec<R>> {
        (**self).find_all().await
    }

    async fn create(&self, record: R) -> StorageResult<R> {
        (**self).create(record).await
    }

    async fn update(&self, id: &str, patch: &Value) -> StorageResult<R> {
        (**self).update(id, patch).await
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        (**self).delete(id).await
    }

    async fn save(&self, record: R) -> StorageResult<R> {
        (**self).save(record).await
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

#[cfg(test)]
mod tests {
    use super::ops;

    #[test]
    fn test_find_by_field_operation_names() {
        assert_eq!(ops::find_by_field("email"), "findByEmail");
        assert_eq!(
            ops::find_by_field("emailVerificationToken"),
            "findByEmailVerificationToken"
        );
        assert_eq!(ops::find_by_field(""), "findBy");
    }
}
