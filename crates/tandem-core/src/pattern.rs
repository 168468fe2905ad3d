//! Glob matching over cache keys and anchored invalidation patterns.

use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::key::KeyCodec;
use crate::operation::OperationName;
use crate::scope::{EntityScope, SEPARATOR};

/// A compiled glob.
///
/// `*` matches any run of characters (including none), `?` matches exactly one
/// character, everything else is literal. Matching is anchored at both ends.
#[derive(Debug, Clone)]
pub struct PatternMatcher {
    glob: String,
    regex: Regex,
}

impl PatternMatcher {
    /// Compiles a glob into an anchored matcher.
    pub fn compile(glob: &str) -> Result<Self> {
        let mut source = String::with_capacity(glob.len() + 8);
        source.push('^');
        let mut literal = String::new();
        for c in glob.chars() {
            match c {
                '*' | '?' => {
                    source.push_str(&regex::escape(&literal));
                    literal.clear();
                    source.push_str(if c == '*' { ".*" } else { "." });
                }
                other => literal.push(other),
            }
        }
        source.push_str(&regex::escape(&literal));
        source.push('$');

        let regex = Regex::new(&source)
            .map_err(|e| CoreError::invalid_pattern(glob, format!("cannot compile: {e}")))?;
        Ok(Self {
            glob: glob.to_string(),
            regex,
        })
    }

    pub fn matches(&self, key: &str) -> bool {
        self.regex.is_match(key)
    }

    pub fn glob(&self) -> &str {
        &self.glob
    }
}

/// A glob over the key space that is anchored to a single entity scope.
///
/// The first three segments (`store:namespace:entity`) must be literal, so a
/// pattern can never reach keys of another namespace or entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InvalidationPattern(String);

impl InvalidationPattern {
    /// Parses and validates an explicit pattern.
    pub fn parse(glob: &str) -> Result<Self> {
        if glob.is_empty() {
            return Err(CoreError::invalid_pattern(glob, "empty pattern"));
        }
        if let Some(c) = glob.chars().find(|c| matches!(c, '[' | ']' | '\\')) {
            return Err(CoreError::invalid_pattern(
                glob,
                format!("character classes and escapes are not supported ('{c}')"),
            ));
        }

        let segments: Vec<&str> = glob.splitn(4, SEPARATOR).collect();
        if segments.len() < 4 {
            return Err(CoreError::invalid_pattern(
                glob,
                "must have the form store:namespace:entity:<glob>",
            ));
        }
        for segment in &segments[..3] {
            if segment.is_empty() || segment.contains(['*', '?']) {
                return Err(CoreError::invalid_pattern(
                    glob,
                    "store, namespace and entity segments must be literal",
                ));
            }
        }
        if segments[3].is_empty() {
            return Err(CoreError::invalid_pattern(glob, "empty key remainder"));
        }

        Ok(Self(glob.to_string()))
    }

    /// `store:namespace:entity:*` — every key of the scope.
    pub fn entity_wide(scope: &EntityScope) -> Self {
        Self(format!("{}{SEPARATOR}*", scope.prefix()))
    }

    /// `store:namespace:entity:{lookup}:{id}*` — identifier lookups of one record.
    pub fn for_identifier(scope: &EntityScope, lookup: &OperationName, id: &str) -> Self {
        let fragment = KeyCodec::fragment(&Value::String(id.to_string()));
        Self(format!(
            "{}{SEPARATOR}{lookup}{SEPARATOR}{fragment}*",
            scope.prefix()
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The literal `store:namespace:entity` prefix.
    pub fn scope_prefix(&self) -> &str {
        let mut seen = 0;
        for (i, c) in self.0.char_indices() {
            if c == SEPARATOR {
                seen += 1;
                if seen == 3 {
                    return &self.0[..i];
                }
            }
        }
        &self.0
    }

    /// Compiles the client-side matcher for this pattern.
    pub fn matcher(&self) -> Result<PatternMatcher> {
        PatternMatcher::compile(&self.0)
    }
}

impl TryFrom<String> for InvalidationPattern {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<InvalidationPattern> for String {
    fn from(pattern: InvalidationPattern) -> Self {
        pattern.0
    }
}

impl fmt::Display for InvalidationPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
