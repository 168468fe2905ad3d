//! # tandem-core
//!
//! Key space primitives for the Tandem cache-aside layer.
//!
//! This crate has no I/O. It defines:
//!
//! - [`EntityScope`] and [`ScopeRegistry`]: the explicit `store:namespace:entity`
//!   identity of a data-access component
//! - [`KeyCodec`]: deterministic cache keys from scope, operation and [`CallArgs`]
//! - [`PatternMatcher`] and [`InvalidationPattern`]: anchored globs over keys
//! - [`OperationSpec`] and [`OperationTable`]: per-operation caching metadata
//! - [`InvalidationPolicy`]: classification of a call and the patterns a write invalidates
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use tandem_core::{call_args, EntityScope, InvalidationPolicy, KeyCodec, OperationSpec};
//!
//! let scope = Arc::new(EntityScope::new("typeorm", "users", "user").unwrap());
//! let find = OperationSpec::read(scope.clone(), "findById").unwrap().cacheable();
//!
//! let key = KeyCodec::default().build_key(&scope, find.name(), &call_args!["abc123"]);
//! assert_eq!(key.as_str(), "typeorm:users:user:findById:abc123");
//!
//! let update = OperationSpec::write(scope, "update").unwrap();
//! let patterns = InvalidationPolicy::default().write_patterns(&update, &call_args!["abc123"]);
//! assert!(patterns.iter().all(|p| p.matcher().unwrap().matches("typeorm:users:user:findById:abc123")));
//! ```

mod args;
mod error;
mod key;
mod operation;
mod pattern;
mod policy;
mod scope;

pub use args::{Arg, CallArgs};
pub use error::{CoreError, Result};
pub use key::{CacheKey, DEFAULT_HASH_THRESHOLD, FINGERPRINT_HASH_LEN, KeyCodec, OPAQUE_FRAGMENT};
pub use operation::{Access, OperationName, OperationOverride, OperationSpec, OperationTable};
pub use pattern::{InvalidationPattern, PatternMatcher};
pub use policy::{
    Classification, DEFAULT_ID_LOOKUP_OPERATION, DEFAULT_WRITE_VOCABULARY, InvalidationPolicy,
};
pub use scope::{EntityScope, SEPARATOR, ScopeRegistry, StoreKind};
