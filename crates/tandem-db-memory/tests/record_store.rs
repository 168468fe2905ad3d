use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tandem_cache::CacheValue;
use tandem_db_memory::{InMemoryRecordStore, create_record_store};
use tandem_storage::{Record, RecordStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Member {
    #[serde(default)]
    id: Option<String>,
    email: String,
    handle: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nickname: Option<String>,
}

impl CacheValue for Member {}

impl Record for Member {
    const KIND: &'static str = "member";
    const NATURAL_KEY_FIELD: &'static str = "email";
    const UNIQUE_FIELDS: &'static [&'static str] = &["email", "handle"];

    fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    fn natural_key(&self) -> Option<&str> {
        Some(&self.email)
    }
}

fn member(email: &str, handle: &str) -> Member {
    Member {
        id: None,
        email: email.into(),
        handle: handle.into(),
        nickname: None,
    }
}

#[tokio::test]
async fn test_create_assigns_uuid() {
    let store = InMemoryRecordStore::<Member>::new();
    let created = store.create(member("a@x.io", "ada")).await.unwrap();

    let id = created.id.clone().unwrap();
    assert_eq!(id.len(), 36);
    assert_eq!(store.find_by_id(&id).await.unwrap(), Some(created));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_unique_fields_enforced() {
    let store = InMemoryRecordStore::<Member>::new();
    store.create(member("a@x.io", "ada")).await.unwrap();

    let err = store.create(member("a@x.io", "other")).await.unwrap_err();
    assert!(err.is_already_exists());
    let err = store.create(member("b@x.io", "ada")).await.unwrap_err();
    assert!(err.to_string().contains("handle"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_create_with_taken_id_fails() {
    let store = InMemoryRecordStore::<Member>::new();
    let mut first = member("a@x.io", "ada");
    first.id = Some("m1".into());
    store.create(first).await.unwrap();

    let mut second = member("b@x.io", "bo");
    second.id = Some("m1".into());
    assert!(store.create(second).await.unwrap_err().is_already_exists());
}

#[tokio::test]
async fn test_update_merges_patch() {
    let store = InMemoryRecordStore::<Member>::new();
    let created = store.create(member("a@x.io", "ada")).await.unwrap();
    let id = created.id.unwrap();

    let updated = store
        .update(&id, &json!({"nickname": "Countess", "id": "ignored"}))
        .await
        .unwrap();
    assert_eq!(updated.nickname.as_deref(), Some("Countess"));
    assert_eq!(updated.id.as_deref(), Some(id.as_str()));

    let cleared = store.update(&id, &json!({"nickname": null})).await.unwrap();
    assert_eq!(cleared.nickname, None);

    assert!(store.update("missing", &json!({})).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_update_cannot_steal_unique_value() {
    let store = InMemoryRecordStore::<Member>::new();
    store.create(member("a@x.io", "ada")).await.unwrap();
    let bo = store.create(member("b@x.io", "bo")).await.unwrap();

    let err = store
        .update(bo.id.as_deref().unwrap(), &json!({"email": "a@x.io"}))
        .await
        .unwrap_err();
    assert!(err.is_already_exists());

    // Keeping its own value is fine.
    store
        .update(bo.id.as_deref().unwrap(), &json!({"email": "b@x.io"}))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_find_by_field_and_all() {
    let store = create_record_store::<Member>();
    store.create(member("a@x.io", "ada")).await.unwrap();
    store.create(member("b@x.io", "bo")).await.unwrap();

    let found = store.find_by_field("handle", "bo").await.unwrap().unwrap();
    assert_eq!(found.email, "b@x.io");
    assert!(store.find_by_field("handle", "nobody").await.unwrap().is_none());
    assert_eq!(store.find_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_save_inserts_or_replaces() {
    let store = InMemoryRecordStore::<Member>::new();
    let mut record = member("a@x.io", "ada");
    assert!(store.save(record.clone()).await.is_err());

    record.id = Some("m1".into());
    store.save(record.clone()).await.unwrap();
    record.nickname = Some("A".into());
    store.save(record.clone()).await.unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.find_by_id("m1").await.unwrap(), Some(record));
}

#[tokio::test]
async fn test_delete_reports_existence() {
    let store = InMemoryRecordStore::<Member>::new();
    let created = store.create(member("a@x.io", "ada")).await.unwrap();
    let id = created.id.unwrap();

    assert!(store.delete(&id).await.unwrap());
    assert!(!store.delete(&id).await.unwrap());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_concurrent_creates_respect_uniqueness() {
    let store = Arc::new(InMemoryRecordStore::<Member>::new());
    let mut handles = Vec::new();
    for i in 0..16 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.create(member("same@x.io", &format!("h{i}"))).await
        }));
    }

    let mut ok = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            ok += 1;
        }
    }
    assert_eq!(ok, 1);
    assert_eq!(store.len(), 1);
}
