use super::hooks::{ProfileHook, TraceHook};
use crate::awaitable::AwaitMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Methods made awaitable when no list is configured.
pub const DEFAULT_ASYNC_METHODS: &[&str] = &[
    "run",
    "exec",
    "get",
    "all",
    "each",
    "close",
    "map",
    "loadExtension",
    "bind",
    "reset",
    "finalize",
];

/// Methods whose calls are rendered for trace and profile hooks by default.
pub const DEFAULT_TRACE_METHODS: &[&str] = &["run", "exec", "get", "all", "each", "map"];

pub(crate) const PREPARE: &str = "prepare";
pub(crate) const BIND: &str = "bind";

type InspectFn = dyn Fn(&AdapterOptions) + Send + Sync;

fn to_owned_list(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| (*name).to_string()).collect()
}

/// Configuration for instrumenting a handle.
///
/// By default no hooks are installed, awaitables are lazy, and the method lists
/// are [`DEFAULT_ASYNC_METHODS`] and [`DEFAULT_TRACE_METHODS`].
#[derive(Clone)]
pub struct AdapterOptions {
    /// Called with the rendered call right before the driver method runs.
    pub trace: Option<Arc<dyn TraceHook>>,
    /// Called with the rendered call and elapsed time after a successful completion.
    pub profile: Option<Arc<dyn ProfileHook>>,
    /// Whether awaitables start on first poll or on construction.
    pub mode: AwaitMode,
    /// Methods exposed as awaitables. `prepare` is always handled separately.
    pub async_methods: Vec<String>,
    /// Subset of `async_methods` rendered for trace/profile hooks.
    pub trace_methods: Vec<String>,
    /// Profiled calls slower than this also trigger `on_slow_call`.
    pub slow_call_threshold: Option<Duration>,
    /// Diagnostic hook receiving the merged options once per instrumented handle.
    pub inspect: Option<Arc<InspectFn>>,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            trace: None,
            profile: None,
            mode: AwaitMode::default(),
            async_methods: to_owned_list(DEFAULT_ASYNC_METHODS),
            trace_methods: to_owned_list(DEFAULT_TRACE_METHODS),
            slow_call_threshold: None,
            inspect: None,
        }
    }
}

impl fmt::Debug for AdapterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdapterOptions")
            .field("trace", &self.trace.is_some())
            .field("profile", &self.profile.is_some())
            .field("mode", &self.mode)
            .field("async_methods", &self.async_methods)
            .field("trace_methods", &self.trace_methods)
            .field("slow_call_threshold", &self.slow_call_threshold)
            .field("inspect", &self.inspect.is_some())
            .finish()
    }
}

impl AdapterOptions {
    /// Create options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the trace hook.
    pub fn with_trace<H: TraceHook + 'static>(self, hook: H) -> Self {
        self.with_trace_arc(Arc::new(hook))
    }

    /// Set the trace hook from an `Arc`.
    pub fn with_trace_arc(mut self, hook: Arc<dyn TraceHook>) -> Self {
        self.trace = Some(hook);
        self
    }

    /// Set the profile hook.
    pub fn with_profile<H: ProfileHook + 'static>(self, hook: H) -> Self {
        self.with_profile_arc(Arc::new(hook))
    }

    /// Set the profile hook from an `Arc`.
    pub fn with_profile_arc(mut self, hook: Arc<dyn ProfileHook>) -> Self {
        self.profile = Some(hook);
        self
    }

    /// Install one observer as both the trace and the profile hook.
    pub fn with_observer<O: TraceHook + ProfileHook + 'static>(mut self, observer: O) -> Self {
        let observer = Arc::new(observer);
        self.trace = Some(observer.clone());
        self.profile = Some(observer);
        self
    }

    /// Select the awaitable flavour.
    pub fn mode(mut self, mode: AwaitMode) -> Self {
        self.mode = mode;
        self
    }

    /// `true` selects eager awaitables, `false` lazy ones (the default).
    pub fn use_promise(self, use_promise: bool) -> Self {
        self.mode(AwaitMode::from_use_promise(use_promise))
    }

    /// Replace the list of methods exposed as awaitables.
    pub fn async_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.async_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the list of methods rendered for trace/profile hooks.
    pub fn trace_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trace_methods = methods.into_iter().map(Into::into).collect();
        self
    }

    /// Set the slow call threshold.
    pub fn with_slow_call_threshold(mut self, threshold: Duration) -> Self {
        self.slow_call_threshold = Some(threshold);
        self
    }

    /// Set the diagnostic hook receiving the merged options.
    pub fn inspect<F>(mut self, f: F) -> Self
    where
        F: Fn(&AdapterOptions) + Send + Sync + 'static,
    {
        self.inspect = Some(Arc::new(f));
        self
    }

    /// Apply method lists loaded from a host configuration file.
    pub fn with_method_lists(mut self, lists: MethodLists) -> Self {
        self.async_methods = lists.async_methods;
        self.trace_methods = lists.trace_methods;
        self.mode = AwaitMode::from_use_promise(lists.use_promise);
        self
    }

    /// Whether a trace or profile hook is installed.
    pub fn is_observed(&self) -> bool {
        self.trace.is_some() || self.profile.is_some()
    }
}

/// Serializable subset of [`AdapterOptions`].
///
/// Missing fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MethodLists {
    #[serde(default = "default_async_methods")]
    pub async_methods: Vec<String>,
    #[serde(default = "default_trace_methods")]
    pub trace_methods: Vec<String>,
    #[serde(default)]
    pub use_promise: bool,
}

impl Default for MethodLists {
    fn default() -> Self {
        Self {
            async_methods: default_async_methods(),
            trace_methods: default_trace_methods(),
            use_promise: false,
        }
    }
}

fn default_async_methods() -> Vec<String> {
    to_owned_list(DEFAULT_ASYNC_METHODS)
}

fn default_trace_methods() -> Vec<String> {
    to_owned_list(DEFAULT_TRACE_METHODS)
}

/// Options merged once at instrumentation time and shared down a prepare chain.
pub(super) struct ResolvedOptions {
    pub(super) options: AdapterOptions,
    observed: bool,
    traced: HashSet<String>,
}

impl ResolvedOptions {
    pub(super) fn resolve(options: AdapterOptions) -> Arc<Self> {
        let observed = options.is_observed();
        let traced = if observed {
            options.trace_methods.iter().cloned().collect()
        } else {
            HashSet::new()
        };
        Arc::new(Self {
            options,
            observed,
            traced,
        })
    }

    /// Whether any hook is installed.
    pub(super) fn is_observed(&self) -> bool {
        self.observed
    }

    /// Whether calls to `method` are rendered and reported.
    pub(super) fn observes(&self, method: &str) -> bool {
        self.observed && self.traced.contains(method)
    }
}
