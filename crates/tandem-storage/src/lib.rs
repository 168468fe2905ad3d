//! Record storage for Tandem.
//!
//! This crate defines the storage contract both stores implement and the
//! pieces that sit on top of it:
//!
//! - [`Record`] - a record kind with an id, a natural key and sensitive fields
//! - [`RecordStore`] - async CRUD over one record kind
//! - [`CachedRecordStore`] - decorator routing every call through the cache
//! - [`DualStoreSynchronizer`] - projects primary mutations into the secondary store
//! - [`StorageError`] - error type shared by all backends

mod cached;
mod error;
mod metrics;
mod record;
mod store;
mod sync;

pub use cached::CachedRecordStore;
pub use error::{ErrorCategory, StorageError, StorageResult};
pub use record::{Record, field_text, merge_patch, merge_preserving, missing_sensitive};
pub use store::{RecordStore, ops};
pub use sync::{DualStoreSynchronizer, SyncOutcome};
