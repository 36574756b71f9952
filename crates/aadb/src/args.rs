//! Positional call arguments passed through to the driver.

use crate::error::DriverError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Per-row callback handed to methods such as `each`.
///
/// Follows the driver convention: an error slot, then the row.
pub type RowCallback = Arc<dyn Fn(Option<&DriverError>, &Value) + Send + Sync>;

/// A single positional argument of a driver call.
#[derive(Clone)]
pub enum Arg {
    /// A data value (SQL text, a parameter, a parameter object, ...).
    Value(Value),
    /// A callable argument. Never rendered in traces.
    Callback(RowCallback),
}

impl Arg {
    /// Wrap a closure as a callback argument.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(Option<&DriverError>, &Value) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// The data value, if this is not a callback.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Callback(_) => None,
        }
    }

    /// Whether this argument is callable.
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback(_))
    }
}

impl fmt::Debug for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<RowCallback> for Arg {
    fn from(cb: RowCallback) -> Self {
        Self::Callback(cb)
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Arg {
                fn from(value: $ty) -> Self {
                    Self::Value(Value::from(value))
                }
            }
        )*
    };
}

impl_from_scalar!(&str, String, bool, i32, i64, u32, u64, f64);

/// Build a `Vec<Arg>` from a list of expressions convertible into [`Arg`].
///
/// ```
/// use aadb::{args, Arg};
///
/// let a: Vec<Arg> = args!["SELECT * FROM users WHERE name = ?", "Leo"];
/// assert_eq!(a.len(), 2);
/// ```
#[macro_export]
macro_rules! args {
    () => {
        ::std::vec::Vec::<$crate::Arg>::new()
    };
    ($($arg:expr),+ $(,)?) => {
        ::std::vec![$($crate::Arg::from($arg)),+]
    };
}
