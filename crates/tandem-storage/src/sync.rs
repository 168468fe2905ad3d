//! Projection of primary-store mutations into the secondary store.
//!
//! The primary store is the source of truth. After a primary mutation
//! succeeds, [`DualStoreSynchronizer::project`] upserts the record into the
//! secondary store and invalidates the cached representations of both stores.
//! A failed projection is logged and reported as [`SyncOutcome::Failed`];
//! it never rolls back or fails the primary mutation, and there is no
//! retry queue. The secondary converges on the next successful projection
//! of the same record.

use std::fmt;
use std::sync::Arc;

use tandem_cache::CacheAside;
use tandem_core::EntityScope;

use crate::error::{StorageError, StorageResult};
use crate::metrics;
use crate::record::{Record, merge_preserving, missing_sensitive};
use crate::store::RecordStore;

/// Result of one projection attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// No secondary row existed; the record was inserted.
    Inserted,
    /// The secondary row with the same id was updated.
    Updated,
    /// A secondary row with the same natural key but another id was replaced.
    Replaced { previous_id: String },
    /// The secondary row was removed.
    Removed,
    /// There was no secondary row to remove.
    Absent,
    /// The secondary store was not brought in line.
    Failed { reason: String },
}

impl SyncOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inserted => "inserted",
            Self::Updated => "updated",
            Self::Replaced { .. } => "replaced",
            Self::Removed => "removed",
            Self::Absent => "absent",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Replaced { previous_id } => write!(f, "replaced (previous id {previous_id})"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
            other => f.write_str(other.label()),
        }
    }
}

/// Keeps the secondary store eventually consistent with the primary store.
pub struct DualStoreSynchronizer<R: Record> {
    secondary: Arc<dyn RecordStore<R>>,
    cache: Arc<CacheAside>,
    primary_scope: Arc<EntityScope>,
    secondary_scope: Arc<EntityScope>,
}

impl<R: Record> DualStoreSynchronizer<R> {
    /// `secondary` must be the undecorated store: lookups here bypass the cache.
    pub fn new(
        secondary: Arc<dyn RecordStore<R>>,
        cache: Arc<CacheAside>,
        primary_scope: Arc<EntityScope>,
        secondary_scope: Arc<EntityScope>,
    ) -> Self {
        Self {
            secondary,
            cache,
            primary_scope,
            secondary_scope,
        }
    }

    /// Upserts `record` into the secondary store, then invalidates both scopes for its id.
    pub async fn project(&self, record: &R) -> SyncOutcome {
        let Some(id) = record.id().map(str::to_string) else {
            return self.finish(
                None,
                SyncOutcome::Failed {
                    reason: format!("{} has no id", R::KIND),
                },
            );
        };

        let outcome = match self.upsert(&id, record).await {
            Ok(outcome) => outcome,
            Err(e) => SyncOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.invalidate(&id).await;
        self.finish(Some(&id), outcome)
    }

    /// Removes the secondary row of a record deleted from the primary store.
    pub async fn retract(&self, id: &str) -> SyncOutcome {
        let outcome = match self.secondary.delete(id).await {
            Ok(true) => SyncOutcome::Removed,
            Ok(false) => SyncOutcome::Absent,
            Err(e) => SyncOutcome::Failed {
                reason: e.to_string(),
            },
        };
        self.invalidate(id).await;
        self.finish(Some(id), outcome)
    }

    async fn upsert(&self, id: &str, record: &R) -> StorageResult<SyncOutcome> {
        let payload = record.to_json()?;

        let existing = match (self.secondary.find_by_id(id).await?, record.natural_key()) {
            (Some(current), _) => Some(current),
            (None, Some(natural_key)) => {
                self.secondary
                    .find_by_field(R::NATURAL_KEY_FIELD, natural_key)
                    .await?
            }
            (None, None) => None,
        };

        let Some(current) = existing else {
            let missing = missing_sensitive(&payload, R::SENSITIVE_FIELDS);
            if !missing.is_empty() {
                return Err(StorageError::invalid_record(format!(
                    "cannot insert {} {id} without {}",
                    R::KIND,
                    missing.join(", ")
                )));
            }
            self.secondary.save(R::from_json(payload)?).await?;
            return Ok(SyncOutcome::Inserted);
        };

        let previous_id = current.id().map(str::to_string);
        let merged = merge_preserving(current.to_json()?, &payload, R::SENSITIVE_FIELDS);
        let mut merged = R::from_json(merged)?;
        merged.set_id(id.to_string());

        match previous_id {
            Some(previous_id) if previous_id != id => {
                self.secondary.delete(&previous_id).await?;
                if let Err(e) = self.secondary.save(merged).await {
                    // The deleted row holds the only copy of the sensitive fields.
                    if let Err(restore) = self.secondary.save(current).await {
                        tracing::error!(
                            kind = R::KIND,
                            previous_id = %previous_id,
                            error = %restore,
                            "failed to restore secondary row after re-key failure"
                        );
                    }
                    return Err(e);
                }
                tracing::info!(
                    kind = R::KIND,
                    id = %id,
                    previous_id = %previous_id,
                    "secondary row re-keyed to primary id"
                );
                self.invalidate(&previous_id).await;
                Ok(SyncOutcome::Replaced { previous_id })
            }
            _ => {
                self.secondary.save(merged).await?;
                Ok(SyncOutcome::Updated)
            }
        }
    }

    async fn invalidate(&self, id: &str) {
        let deleted = self.cache.invalidate_scope(&self.primary_scope, Some(id)).await
            + self.cache.invalidate_scope(&self.secondary_scope, Some(id)).await;
        tracing::debug!(kind = R::KIND, id = %id, deleted, "dual-store caches invalidated");
    }

    fn finish(&self, id: Option<&str>, outcome: SyncOutcome) -> SyncOutcome {
        metrics::record_sync(outcome.label());
        match &outcome {
            SyncOutcome::Failed { reason } => tracing::warn!(
                kind = R::KIND,
                id = id.unwrap_or("-"),
                backend = self.secondary.backend_name(),
                error = %reason,
                "synchronization failure"
            ),
            other => tracing::debug!(
                kind = R::KIND,
                id = id.unwrap_or("-"),
                outcome = %other,
                "secondary store synchronized"
            ),
        }
        outcome
    }
}
