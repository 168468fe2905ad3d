//! Per-call classification of operations and invalidation pattern derivation.
//!
//! Precedence, highest first:
//!
//! 1. no-cache
//! 2. explicit invalidation patterns
//! 3. write (declared, or detected from the write vocabulary)
//! 4. cacheable read
//! 5. pass-through

use std::time::Duration;

use serde_json::Value;

use crate::args::{Arg, CallArgs};
use crate::operation::{Access, OperationName, OperationSpec};
use crate::pattern::InvalidationPattern;
use crate::scope::EntityScope;

/// Name prefixes that mark an undeclared operation as a write.
pub const DEFAULT_WRITE_VOCABULARY: &[&str] = &[
    "create",
    "update",
    "save",
    "delete",
    "remove",
    "upsert",
    "insert",
    "softDelete",
    "increment",
    "mark",
    "pin",
    "unpin",
];

/// Operation whose keys get an identifier-scoped pattern on writes.
pub const DEFAULT_ID_LOOKUP_OPERATION: &str = "findById";

/// Fields probed when extracting an identifier from an object argument.
const ID_FIELDS: &[&str] = &["id", "_id"];

/// Outcome of classifying one call.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Execute without touching the cache.
    NoCache,
    /// Execute, then apply these patterns.
    ExplicitInvalidate(Vec<InvalidationPattern>),
    /// Execute, then invalidate the operation's scope.
    Write,
    /// Read through the cache.
    Cacheable { ttl: Option<Duration> },
    /// Execute without touching the cache.
    PassThrough,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoCache => "no_cache",
            Self::ExplicitInvalidate(_) => "explicit_invalidate",
            Self::Write => "write",
            Self::Cacheable { .. } => "cacheable",
            Self::PassThrough => "pass_through",
        }
    }
}

/// Classifies operations and computes the patterns a write must invalidate.
#[derive(Debug, Clone)]
pub struct InvalidationPolicy {
    vocabulary: Vec<String>,
    id_lookup: OperationName,
}

impl Default for InvalidationPolicy {
    fn default() -> Self {
        Self {
            vocabulary: DEFAULT_WRITE_VOCABULARY
                .iter()
                .map(|s| s.to_string())
                .collect(),
            id_lookup: OperationName(DEFAULT_ID_LOOKUP_OPERATION.to_string()),
        }
    }
}

impl InvalidationPolicy {
    pub fn new<I, S>(vocabulary: I, id_lookup: OperationName) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            vocabulary: vocabulary.into_iter().map(Into::into).collect(),
            id_lookup,
        }
    }

    pub fn id_lookup(&self) -> &OperationName {
        &self.id_lookup
    }

    /// Classifies a call of `op`.
    pub fn classify(&self, op: &OperationSpec) -> Classification {
        if op.is_no_cache() {
            return Classification::NoCache;
        }
        if !op.invalidates().is_empty() {
            return Classification::ExplicitInvalidate(op.invalidates().to_vec());
        }
        let is_write = match op.access() {
            Some(Access::Write) => true,
            Some(Access::Read) => false,
            None => self.is_write_name(op.name().as_str()),
        };
        if is_write {
            return Classification::Write;
        }
        if op.is_cacheable() {
            return Classification::Cacheable { ttl: op.ttl() };
        }
        Classification::PassThrough
    }

    /// Returns `true` if `name` starts with a vocabulary term at a word boundary.
    ///
    /// `updateResetToken` and `delete_user` match; `updater`, `findAndUpdateCache` do not.
    pub fn is_write_name(&self, name: &str) -> bool {
        self.vocabulary.iter().any(|term| {
            let Some(head) = name.get(..term.len()) else {
                return false;
            };
            if !head.eq_ignore_ascii_case(term) {
                return false;
            }
            match name[term.len()..].chars().next() {
                None => true,
                Some(c) => c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_',
            }
        })
    }

    /// Extracts a record identifier from the first argument.
    ///
    /// Strings and numbers are identifiers themselves; objects contribute
    /// their `id` or `_id` field.
    pub fn identifier_of(args: &CallArgs) -> Option<String> {
        let value = match args.first()? {
            Arg::Value(v) => v,
            Arg::Opaque => return None,
        };
        match value {
            Value::Object(map) => ID_FIELDS
                .iter()
                .find_map(|field| map.get(*field).and_then(scalar_id)),
            other => scalar_id(other),
        }
    }

    /// Patterns covering a scope, narrowed additionally to one identifier when known.
    pub fn patterns_for(&self, scope: &EntityScope, id: Option<&str>) -> Vec<InvalidationPattern> {
        let mut patterns = vec![InvalidationPattern::entity_wide(scope)];
        if let Some(id) = id {
            patterns.push(InvalidationPattern::for_identifier(
                scope,
                &self.id_lookup,
                id,
            ));
        }
        patterns
    }

    /// Patterns a successful write of `op` with `args` must apply.
    pub fn write_patterns(&self, op: &OperationSpec, args: &CallArgs) -> Vec<InvalidationPattern> {
        let id = Self::identifier_of(args);
        self.patterns_for(op.scope(), id.as_deref())
    }
}

fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
