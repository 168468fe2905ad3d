//! Cache key construction.
//!
//! Keys have the shape `{store}:{namespace}:{entity}:{operation}:{fingerprint}`.
//! The fingerprint is the normalized argument list. It is kept literal (and
//! human-inspectable) up to a length threshold and replaced by a fixed-length
//! content hash beyond it.
//!
//! Normalization rules:
//!
//! | Argument | Fragment |
//! |----------|----------|
//! | `null` | `null` |
//! | string | the string itself |
//! | number, bool | canonical display |
//! | array, object | JSON with object keys sorted at every depth |
//! | unserializable | `~opaque` |
//!
//! Fragments are percent-escaped so that no fingerprint ever contains the
//! segment separator or a glob metacharacter.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::args::{Arg, CallArgs};
use crate::operation::OperationName;
use crate::scope::{EntityScope, SEPARATOR};

/// Default fingerprint length above which the fingerprint is hashed.
pub const DEFAULT_HASH_THRESHOLD: usize = 100;

/// Number of hex characters kept from the digest.
pub const FINGERPRINT_HASH_LEN: usize = 16;

/// Marks a hashed fingerprint. Escaped in literal fingerprints, so the two never collide.
const HASH_MARKER: char = '~';

/// Delimiter between normalized arguments.
const ARG_DELIMITER: char = '|';

/// Placeholder fragment for arguments that could not be serialized.
pub const OPAQUE_FRAGMENT: &str = "~opaque";

/// Characters escaped inside fingerprints.
const RESERVED: &[char] = &['%', ':', '*', '?', '[', ']', '\\', '|', '~'];

/// A fully built cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Returns the argument fingerprint (the segment after the operation).
    pub fn fingerprint(&self) -> &str {
        self.0.splitn(5, SEPARATOR).nth(4).unwrap_or_default()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Builds deterministic cache keys from scope, operation and arguments.
#[derive(Debug, Clone)]
pub struct KeyCodec {
    hash_threshold: usize,
}

impl Default for KeyCodec {
    fn default() -> Self {
        Self::new(DEFAULT_HASH_THRESHOLD)
    }
}

impl KeyCodec {
    pub fn new(hash_threshold: usize) -> Self {
        Self { hash_threshold }
    }

    pub fn hash_threshold(&self) -> usize {
        self.hash_threshold
    }

    /// Builds the key for one call.
    pub fn build_key(
        &self,
        scope: &EntityScope,
        operation: &OperationName,
        args: &CallArgs,
    ) -> CacheKey {
        CacheKey(format!(
            "{}{SEPARATOR}{}{SEPARATOR}{}",
            scope.prefix(),
            operation,
            self.fingerprint(args)
        ))
    }

    /// Computes the argument fingerprint.
    pub fn fingerprint(&self, args: &CallArgs) -> String {
        let mut literal = String::new();
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                literal.push(ARG_DELIMITER);
            }
            match arg {
                Arg::Value(value) => literal.push_str(&Self::fragment(value)),
                Arg::Opaque => literal.push_str(OPAQUE_FRAGMENT),
            }
        }

        if literal.len() > self.hash_threshold {
            hash_fingerprint(&literal)
        } else {
            literal
        }
    }

    /// Normalizes and escapes a single value.
    ///
    /// Identifier-scoped invalidation patterns use this so that they agree
    /// with the keys built on the read path.
    pub fn fragment(value: &Value) -> String {
        escape(&normalize(value))
    }
}

fn normalize(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(&canonical(value))
            .unwrap_or_else(|_| OPAQUE_FRAGMENT.to_string()),
    }
}

/// Rebuilds a value with object keys inserted in sorted order at every depth.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if RESERVED.contains(&c) || c.is_control() {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        } else {
            out.push(c);
        }
    }
    out
}

fn hash_fingerprint(literal: &str) -> String {
    let digest = Sha256::digest(literal.as_bytes());
    let hex = hex::encode(digest);
    format!("{HASH_MARKER}{}", &hex[..FINGERPRINT_HASH_LEN])
}
