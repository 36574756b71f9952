//! The callback-style driver boundary.
//!
//! A driver exposes database and statement handles whose methods take their
//! positional arguments plus one trailing [`Completion`]. The adapter never looks
//! inside a handle; it only calls methods by name.

use crate::args::Arg;
use crate::error::DriverError;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Completion callback injected as the last argument of every driver call.
///
/// Mirrors the driver convention of `(error_or_null, result)`. Consuming `self`
/// guarantees a completion fires at most once.
pub struct Completion {
    inner: Box<dyn FnOnce(Option<DriverError>, Value) + Send>,
}

impl Completion {
    /// Wrap a closure as a completion.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(Option<DriverError>, Value) + Send + 'static,
    {
        Self { inner: Box::new(f) }
    }

    /// Invoke the completion with the driver's raw `(error, result)` pair.
    pub fn done(self, err: Option<DriverError>, value: Value) {
        (self.inner)(err, value)
    }

    /// Complete successfully.
    pub fn ok(self, value: Value) {
        self.done(None, value)
    }

    /// Complete with an error.
    pub fn fail(self, err: DriverError) {
        self.done(Some(err), Value::Null)
    }

    /// Complete from a `Result`.
    pub fn settle(self, result: Result<Value, DriverError>) {
        match result {
            Ok(value) => self.ok(value),
            Err(err) => self.fail(err),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Completion(..)")
    }
}

/// A database or statement handle with callback-style methods.
///
/// Implementations may invoke the completion synchronously inside [`call`](Self::call),
/// later from a spawned task, or from another thread.
pub trait CallbackHandle: Send + Sync {
    /// Display name of the handle type (`Database`, `Statement`, ...).
    fn type_name(&self) -> &str;

    /// Whether the handle exposes a callable method with this name.
    fn has_method(&self, name: &str) -> bool;

    /// Invoke `method` with `args` and the trailing completion.
    ///
    /// Returning `Err` reports a synchronous failure; the completion must then be
    /// dropped or left uncalled.
    fn call(&self, method: &str, args: Vec<Arg>, done: Completion) -> Result<(), DriverError>;

    /// Create a statement handle.
    ///
    /// The statement is returned synchronously; readiness (or failure) is reported
    /// through `done`. The default implementation reports that the handle cannot
    /// prepare statements.
    fn prepare(
        &self,
        args: Vec<Arg>,
        done: Completion,
    ) -> Result<Option<Arc<dyn CallbackHandle>>, DriverError> {
        let _ = (args, done);
        Err(DriverError::new(format!(
            "{} does not support prepare",
            self.type_name()
        )))
    }
}
