//! In-memory record store backend for Tandem.
//!
//! Provides an implementation of the `RecordStore` trait from `tandem-storage`
//! using papaya lock-free HashMap for concurrent access. It serves as the
//! primary store in single-process deployments and as either store in tests.
//!
//! # Example
//!
//! ```ignore
//! use tandem_db_memory::InMemoryRecordStore;
//! use tandem_storage::RecordStore;
//!
//! let users = InMemoryRecordStore::<User>::new();
//! let created = users.create(new_user).await?;
//! assert!(created.id().is_some());
//! ```

mod store;

pub use store::InMemoryRecordStore;

// Re-export the storage contract for convenience
pub use tandem_storage::{RecordStore, StorageError};

/// Type alias for a shareable record store.
pub type DynRecordStore<R> = std::sync::Arc<dyn RecordStore<R>>;

/// Creates a new in-memory record store behind an `Arc`.
pub fn create_record_store<R: tandem_storage::Record>() -> DynRecordStore<R> {
    std::sync::Arc::new(InMemoryRecordStore::<R>::new())
}
