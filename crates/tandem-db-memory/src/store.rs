use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use papaya::HashMap as PapayaHashMap;
use serde_json::Value;
use tandem_storage::{
    Record, RecordStore, StorageError, StorageResult, field_text, merge_patch,
};
use tokio::sync::Mutex;

/// In-memory record store using papaya lock-free HashMap.
///
/// Records are kept in their JSON form keyed by id. Reads are lock-free;
/// writes are serialized so uniqueness checks and the insert they guard
/// happen atomically.
#[derive(Debug)]
pub struct InMemoryRecordStore<R> {
    data: Arc<PapayaHashMap<String, Value>>,
    write_lock: Mutex<()>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Record> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            data: Arc::new(PapayaHashMap::new()),
            write_lock: Mutex::new(()),
            _record: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.data.pin().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get_json(&self, id: &str) -> Option<Value> {
        self.data.pin().get(id).cloned()
    }

    /// Fails if another record already holds one of `value`'s unique fields.
    fn check_unique(&self, id: &str, value: &Value) -> StorageResult<()> {
        let guard = self.data.pin();
        for field in R::UNIQUE_FIELDS {
            let Some(candidate) = field_text(value, field) else {
                continue;
            };
            let taken = guard.iter().any(|(other_id, other)| {
                other_id != id && field_text(other, field).as_deref() == Some(candidate.as_str())
            });
            if taken {
                return Err(StorageError::already_exists(R::KIND, *field, candidate));
            }
        }
        Ok(())
    }

    fn put(&self, id: String, value: Value) -> StorageResult<R> {
        let record = R::from_json(value.clone())?;
        self.data.pin().insert(id, value);
        Ok(record)
    }
}

#[async_trait]
impl<R: Record> RecordStore<R> for InMemoryRecordStore<R> {
    async fn find_by_id(&self, id: &str) -> StorageResult<Option<R>> {
        self.get_json(id).map(R::from_json).transpose()
    }

    async fn find_by_field(&self, field: &str, value: &str) -> StorageResult<Option<R>> {
        let found = {
            let guard = self.data.pin();
            guard
                .iter()
                .filter(|(_, record)| field_text(record, field).as_deref() == Some(value))
                .min_by(|(a, _), (b, _)| a.cmp(b))
                .map(|(_, record)| record.clone())
        };
        found.map(R::from_json).transpose()
    }

    async fn find_all(&self) -> StorageResult<Vec<R>> {
        let mut rows: Vec<(String, Value)> = {
            let guard = self.data.pin();
            guard
                .iter()
                .map(|(id, record)| (id.clone(), record.clone()))
                .collect()
        };
        rows.sort_by(|(a, _), (b, _)| a.cmp(b));
        rows.into_iter().map(|(_, record)| R::from_json(record)).collect()
    }

    async fn create(&self, mut record: R) -> StorageResult<R> {
        let _write = self.write_lock.lock().await;

        let id = match record.id() {
            Some(id) => id.to_string(),
            None => {
                let id = uuid::Uuid::new_v4().to_string();
                record.set_id(id.clone());
                id
            }
        };
        if self.get_json(&id).is_some() {
            return Err(StorageError::already_exists(R::KIND, "id", id));
        }

        let value = record.to_json()?;
        self.check_unique(&id, &value)?;
        let created = self.put(id.clone(), value)?;
        tracing::debug!(kind = R::KIND, id = %id, "record created");
        Ok(created)
    }

    async fn update(&self, id: &str, patch: &Value) -> StorageResult<R> {
        let _write = self.write_lock.lock().await;

        let mut value = self
            .get_json(id)
            .ok_or_else(|| StorageError::not_found(R::KIND, id))?;
        merge_patch(&mut value, patch);
        if let Value::Object(map) = &mut value {
            map.insert(R::ID_FIELD.to_string(), Value::String(id.to_string()));
        }

        self.check_unique(id, &value)?;
        self.put(id.to_string(), value)
    }

    async fn delete(&self, id: &str) -> StorageResult<bool> {
        let _write = self.write_lock.lock().await;
        Ok(self.data.pin().remove(id).is_some())
    }

    async fn save(&self, record: R) -> StorageResult<R> {
        let _write = self.write_lock.lock().await;

        let id = record
            .id()
            .ok_or_else(|| StorageError::invalid_record(format!("{} has no id", R::KIND)))?
            .to_string();
        let value = record.to_json()?;
        self.check_unique(&id, &value)?;
        self.put(id, value)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
