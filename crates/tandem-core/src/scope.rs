//! Entity scopes: the `store:namespace:entity` prefix shared by keys and patterns.
//!
//! Scopes are declared explicitly by the component that owns the data access.
//! The [`ScopeRegistry`] memoizes the first binding of a component so that the
//! read path and the write path can never disagree on where an entity lives.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Separator between key segments.
pub const SEPARATOR: char = ':';

/// Characters that have a meaning in glob patterns and are not allowed in labels.
const GLOB_META: &[char] = &['*', '?', '[', ']', '\\'];

/// Validates a label used as a key segment.
pub(crate) fn validate_label(field: &'static str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(CoreError::invalid_label(field, value, "must not be empty"));
    }
    if value.contains(SEPARATOR) {
        return Err(CoreError::invalid_label(field, value, "contains ':'"));
    }
    if let Some(c) = value.chars().find(|c| GLOB_META.contains(c)) {
        return Err(CoreError::invalid_label(
            field,
            value,
            format!("contains glob character '{c}'"),
        ));
    }
    if value.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(CoreError::invalid_label(
            field,
            value,
            "contains whitespace or control characters",
        ));
    }
    Ok(())
}

/// Label of the backing store family a key belongs to (e.g. `typeorm`, `mongoose`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreKind(String);

impl StoreKind {
    /// Creates a validated store kind label.
    pub fn new(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        validate_label("store kind", &label)?;
        Ok(Self(label))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StoreKind {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<StoreKind> for String {
    fn from(kind: StoreKind) -> Self {
        kind.0
    }
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The namespace/entity pair of a data-access component, qualified by store kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityScope {
    store: StoreKind,
    namespace: String,
    entity: String,
}

impl EntityScope {
    /// Creates a scope from raw labels, validating each segment.
    pub fn new(
        store: impl Into<String>,
        namespace: impl Into<String>,
        entity: impl Into<String>,
    ) -> Result<Self> {
        let store = StoreKind::new(store)?;
        Self::with_store(store, namespace, entity)
    }

    /// Creates a scope for an already validated store kind.
    pub fn with_store(
        store: StoreKind,
        namespace: impl Into<String>,
        entity: impl Into<String>,
    ) -> Result<Self> {
        let namespace = namespace.into();
        let entity = entity.into();
        validate_label("namespace", &namespace)?;
        validate_label("entity", &entity)?;
        Ok(Self {
            store,
            namespace,
            entity,
        })
    }

    /// Parses a `store:namespace:entity` prefix.
    pub fn parse(prefix: &str) -> Result<Self> {
        let mut parts = prefix.split(SEPARATOR);
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(store), Some(namespace), Some(entity), None) => {
                Self::new(store, namespace, entity)
            }
            _ => Err(CoreError::invalid_label(
                "scope",
                prefix,
                "expected store:namespace:entity",
            )),
        }
    }

    pub fn store(&self) -> &StoreKind {
        &self.store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns `store:namespace:entity`, the literal prefix of every key in this scope.
    pub fn prefix(&self) -> String {
        format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.store, self.namespace, self.entity
        )
    }
}

impl fmt::Display for EntityScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            self.store, self.namespace, self.entity
        )
    }
}

/// Process-wide memo of component → scope bindings.
///
/// The first binding for a component wins. Binding the same component again to
/// an equal scope returns the memoized instance; binding it to a different
/// scope is rejected.
#[derive(Debug, Default)]
pub struct ScopeRegistry {
    bindings: DashMap<String, Arc<EntityScope>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `component` to `scope`, or returns the existing equal binding.
    pub fn bind(&self, component: &str, scope: EntityScope) -> Result<Arc<EntityScope>> {
        let entry = self
            .bindings
            .entry(component.to_string())
            .or_insert_with(|| Arc::new(scope.clone()));
        let existing = Arc::clone(entry.value());
        drop(entry);

        if *existing != scope {
            return Err(CoreError::ScopeConflict {
                component: component.to_string(),
                existing: existing.to_string(),
                requested: scope.to_string(),
            });
        }

        tracing::trace!(component, scope = %existing, "scope bound");
        Ok(existing)
    }

    /// Returns the memoized scope of a component.
    pub fn resolve(&self, component: &str) -> Option<Arc<EntityScope>> {
        self.bindings.get(component).map(|s| Arc::clone(s.value()))
    }

    /// Returns `true` if any component is bound to a scope with this prefix.
    pub fn knows_prefix(&self, prefix: &str) -> bool {
        self.bindings.iter().any(|s| s.value().prefix() == prefix)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}
