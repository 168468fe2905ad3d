//! Operation metadata declared when a data-access component is composed.
//!
//! Every wrapped method is described by an [`OperationSpec`]: its name (the
//! operation segment of cache keys), the scope it reads or writes, and the
//! caching flags the invalidation policy consumes. Specs are built in code and
//! may be adjusted from configuration with [`OperationOverride`].

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::pattern::InvalidationPattern;
use crate::scope::{EntityScope, ScopeRegistry, validate_label};

/// Validated operation label (e.g. `findById`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OperationName(pub(crate) String);

impl OperationName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_label("operation", &name)?;
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for OperationName {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<OperationName> for String {
    fn from(name: OperationName) -> Self {
        name.0
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Declared access mode of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Access {
    Read,
    Write,
}

/// Caching metadata of one operation.
#[derive(Debug, Clone)]
pub struct OperationSpec {
    name: OperationName,
    scope: Arc<EntityScope>,
    access: Option<Access>,
    cacheable: bool,
    ttl: Option<Duration>,
    invalidates: Vec<InvalidationPattern>,
    no_cache: bool,
}

impl OperationSpec {
    /// An operation with undeclared access; the policy falls back to the write vocabulary.
    pub fn new(scope: Arc<EntityScope>, name: &str) -> Result<Self> {
        Ok(Self {
            name: OperationName::new(name)?,
            scope,
            access: None,
            cacheable: false,
            ttl: None,
            invalidates: Vec::new(),
            no_cache: false,
        })
    }

    /// An operation declared as a read. Reads are not cached unless marked [`cacheable`](Self::cacheable).
    pub fn read(scope: Arc<EntityScope>, name: &str) -> Result<Self> {
        Ok(Self::new(scope, name)?.with_access(Access::Read))
    }

    /// An operation declared as a write.
    pub fn write(scope: Arc<EntityScope>, name: &str) -> Result<Self> {
        Ok(Self::new(scope, name)?.with_access(Access::Write))
    }

    #[must_use]
    pub fn with_access(mut self, access: Access) -> Self {
        self.access = Some(access);
        self
    }

    /// Opts the operation into read-through caching.
    #[must_use]
    pub fn cacheable(mut self) -> Self {
        self.cacheable = true;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Replaces the explicit invalidation list.
    #[must_use]
    pub fn invalidating(mut self, patterns: Vec<InvalidationPattern>) -> Self {
        self.invalidates = patterns;
        self
    }

    /// Bypasses the cache entirely, whatever else is declared.
    #[must_use]
    pub fn no_cache(mut self) -> Self {
        self.no_cache = true;
        self
    }

    pub fn name(&self) -> &OperationName {
        &self.name
    }

    pub fn scope(&self) -> &Arc<EntityScope> {
        &self.scope
    }

    pub fn access(&self) -> Option<Access> {
        self.access
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn invalidates(&self) -> &[InvalidationPattern] {
        &self.invalidates
    }

    pub fn is_no_cache(&self) -> bool {
        self.no_cache
    }

    /// Applies a configuration override to this spec.
    pub fn apply_override(mut self, ov: &OperationOverride) -> Result<Self> {
        if let Some(access) = ov.access {
            self.access = Some(access);
        }
        if let Some(cacheable) = ov.cacheable {
            self.cacheable = cacheable;
        }
        if let Some(no_cache) = ov.no_cache {
            self.no_cache = no_cache;
        }
        if let Some(secs) = ov.ttl_secs {
            if secs == 0 {
                return Err(CoreError::invalid_label(
                    "ttl",
                    "0",
                    "cache entries must expire; use no_cache to disable caching",
                ));
            }
            self.ttl = Some(Duration::from_secs(secs));
        }
        if let Some(patterns) = &ov.invalidate {
            self.invalidates = patterns
                .iter()
                .map(|p| InvalidationPattern::parse(p))
                .collect::<Result<Vec<_>>>()?;
        }
        Ok(self)
    }
}

/// Configuration-side adjustment of a registered operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationOverride {
    /// Scope prefix, `store:namespace:entity`.
    pub scope: String,
    /// Operation name.
    pub operation: String,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub cacheable: Option<bool>,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
    #[serde(default)]
    pub no_cache: Option<bool>,
    #[serde(default)]
    pub invalidate: Option<Vec<String>>,
}

/// The operations of one component, keyed by operation name.
#[derive(Debug, Clone)]
pub struct OperationTable {
    scope: Arc<EntityScope>,
    operations: HashMap<String, OperationSpec>,
}

impl OperationTable {
    pub fn new(scope: Arc<EntityScope>) -> Self {
        Self {
            scope,
            operations: HashMap::new(),
        }
    }

    /// Adds a spec. Specs of a foreign scope are rejected.
    pub fn insert(&mut self, spec: OperationSpec) -> Result<()> {
        if spec.scope() != &self.scope {
            return Err(CoreError::unknown_scope(
                spec.scope().prefix(),
                format!("operation table for {}", self.scope),
            ));
        }
        self.operations.insert(spec.name().as_str().to_string(), spec);
        Ok(())
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, spec: OperationSpec) -> Result<Self> {
        self.insert(spec)?;
        Ok(self)
    }

    pub fn get(&self, name: &str) -> Option<&OperationSpec> {
        self.operations.get(name)
    }

    /// Returns the registered spec, or an undeclared spec (classified by the write vocabulary).
    pub fn resolve(&self, name: &str) -> Result<OperationSpec> {
        match self.operations.get(name) {
            Some(spec) => Ok(spec.clone()),
            None => OperationSpec::new(Arc::clone(&self.scope), name),
        }
    }

    pub fn scope(&self) -> &Arc<EntityScope> {
        &self.scope
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Applies the overrides that target this table's scope.
    ///
    /// An override naming an operation that is not registered declares it.
    pub fn apply_overrides(&mut self, overrides: &[OperationOverride]) -> Result<usize> {
        let prefix = self.scope.prefix();
        let mut applied = 0;
        for ov in overrides.iter().filter(|ov| ov.scope == prefix) {
            let spec = self.resolve(&ov.operation)?.apply_override(ov)?;
            tracing::debug!(
                scope = %prefix,
                operation = %spec.name(),
                cacheable = spec.is_cacheable(),
                no_cache = spec.is_no_cache(),
                "operation override applied"
            );
            self.operations.insert(ov.operation.clone(), spec);
            applied += 1;
        }
        Ok(applied)
    }

    /// Checks that every explicit pattern targets a registered scope.
    pub fn validate(&self, registry: &ScopeRegistry) -> Result<()> {
        for spec in self.operations.values() {
            for pattern in spec.invalidates() {
                if !registry.knows_prefix(pattern.scope_prefix()) {
                    return Err(CoreError::unknown_scope(
                        pattern.scope_prefix(),
                        format!("pattern {pattern} of operation {}", spec.name()),
                    ));
                }
            }
        }
        Ok(())
    }
}
