//! Captured call arguments.
//!
//! A wrapped call hands its arguments to the cache layer as [`CallArgs`]. Each
//! argument is converted to a JSON value up front; a value that cannot be
//! serialized is kept as [`Arg::Opaque`] so that key construction never fails.

use serde::Serialize;
use serde_json::Value;

/// A single captured argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// The argument's JSON form.
    Value(Value),
    /// The argument could not be serialized.
    Opaque,
}

impl Arg {
    /// Captures any serializable value.
    pub fn capture<A: Serialize + ?Sized>(value: &A) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Self::Value(v),
            Err(e) => {
                tracing::debug!(error = %e, "argument is not serializable, using placeholder");
                Self::Opaque
            }
        }
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Opaque => None,
        }
    }
}

/// Ordered arguments of one data-access call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallArgs(Vec<Arg>);

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an argument (builder style).
    #[must_use]
    pub fn arg<A: Serialize + ?Sized>(mut self, value: &A) -> Self {
        self.0.push(Arg::capture(value));
        self
    }

    /// Appends an already captured argument.
    pub fn push(&mut self, arg: Arg) {
        self.0.push(arg);
    }

    pub fn first(&self) -> Option<&Arg> {
        self.0.first()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arg> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<Value>> for CallArgs {
    fn from(values: Vec<Value>) -> Self {
        Self(values.into_iter().map(Arg::Value).collect())
    }
}

impl FromIterator<Arg> for CallArgs {
    fn from_iter<I: IntoIterator<Item = Arg>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Builds [`CallArgs`] from a list of serializable expressions.
///
/// ```
/// use tandem_core::call_args;
///
/// let args = call_args!["abc123", 42];
/// assert_eq!(args.len(), 2);
/// ```
#[macro_export]
macro_rules! call_args {
    () => {
        $crate::CallArgs::new()
    };
    ($($arg:expr),+ $(,)?) => {
        $crate::CallArgs::new()$(.arg(&$arg))+
    };
}
