//! Error types for key construction, pattern compilation and operation registration.

/// Errors raised while declaring scopes, operations and invalidation patterns.
///
/// These are registration-time errors. Nothing on the per-call path
/// (key construction, classification) returns them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A store kind, namespace, entity or operation label is not usable as a key segment.
    #[error("Invalid {field} label '{value}': {reason}")]
    InvalidLabel {
        /// Which segment the label was meant for.
        field: &'static str,
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// An invalidation pattern is malformed or not anchored to an entity scope.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected glob.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A component was already bound to a different scope.
    #[error("Component {component} is bound to {existing}, cannot rebind to {requested}")]
    ScopeConflict {
        /// Component name.
        component: String,
        /// Scope it is bound to.
        existing: String,
        /// Scope that was requested.
        requested: String,
    },

    /// An operation or pattern refers to a scope nobody registered.
    #[error("Unknown scope '{scope}' referenced by {context}")]
    UnknownScope {
        /// The scope prefix (`store:namespace:entity`).
        scope: String,
        /// Where the reference came from.
        context: String,
    },
}

impl CoreError {
    /// Creates a new `InvalidLabel` error.
    #[must_use]
    pub fn invalid_label(
        field: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::InvalidLabel {
            field,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `InvalidPattern` error.
    #[must_use]
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `UnknownScope` error.
    #[must_use]
    pub fn unknown_scope(scope: impl Into<String>, context: impl Into<String>) -> Self {
        Self::UnknownScope {
            scope: scope.into(),
            context: context.into(),
        }
    }

    /// Returns `true` if this is a pattern error.
    #[must_use]
    pub fn is_invalid_pattern(&self) -> bool {
        matches!(self, Self::InvalidPattern { .. })
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
