use std::time::Duration;

/// What an observer learns about a single instrumented call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo<'a> {
    /// Rendered arguments, including inherited or bound parameters.
    pub rendered: &'a str,
    /// Method name as exposed by the driver (`get`, `run`, ...).
    pub method: &'a str,
    /// Type name of the handle (`Database`, `Statement`, ...).
    pub type_name: &'a str,
}

impl<'a> CallInfo<'a> {
    /// Create call info.
    pub fn new(rendered: &'a str, method: &'a str, type_name: &'a str) -> Self {
        Self {
            rendered,
            method,
            type_name,
        }
    }
}

/// Elapsed time in milliseconds with sub-millisecond precision.
pub fn elapsed_ms(elapsed: Duration) -> f64 {
    elapsed.as_secs_f64() * 1e3
}

/// Hook invoked before a traced driver call executes.
///
/// Closures of shape `Fn(&str, &str, &str)` receive `(rendered, method, type_name)`.
pub trait TraceHook: Send + Sync {
    fn on_trace(&self, call: &CallInfo<'_>);
}

impl<F> TraceHook for F
where
    F: Fn(&str, &str, &str) + Send + Sync,
{
    fn on_trace(&self, call: &CallInfo<'_>) {
        self(call.rendered, call.method, call.type_name)
    }
}

/// Hook invoked after a profiled driver call completes successfully.
///
/// Closures of shape `Fn(&str, Duration, &str, &str)` receive
/// `(rendered, elapsed, method, type_name)`.
pub trait ProfileHook: Send + Sync {
    /// Called before the result is delivered to the awaiting caller.
    fn on_profile(&self, call: &CallInfo<'_>, elapsed: Duration);

    /// Called after `on_profile` when the call exceeded the slow call threshold.
    ///
    /// Default implementation does nothing.
    fn on_slow_call(&self, _call: &CallInfo<'_>, _elapsed: Duration) {}
}

impl<F> ProfileHook for F
where
    F: Fn(&str, Duration, &str, &str) + Send + Sync,
{
    fn on_profile(&self, call: &CallInfo<'_>, elapsed: Duration) {
        self(call.rendered, elapsed, call.method, call.type_name)
    }
}
