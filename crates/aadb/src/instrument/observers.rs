use super::hooks::{CallInfo, ProfileHook, TraceHook, elapsed_ms};
use super::truncate_rendered;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// An observer that prints calls to stderr.
///
/// Output looks like `  trace: Database.get: SELECT 1` and
/// `profile: Database.get: SELECT 1 0.042 msec`.
#[derive(Debug, Clone)]
pub struct LoggingObserver {
    /// Minimum duration for profile lines (filters out fast calls).
    pub min_duration: Option<Duration>,
    /// Truncate long rendered calls (in bytes). `None` means no truncation.
    pub max_rendered_length: Option<usize>,
    /// Whether trace lines are printed.
    pub log_traces: bool,
    /// Prefix for log lines.
    pub prefix: String,
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self {
            min_duration: None,
            max_rendered_length: Some(200),
            log_traces: true,
            prefix: "[aadb]".to_string(),
        }
    }
}

impl LoggingObserver {
    /// Create a new logging observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Only print profile lines for calls slower than this duration.
    pub fn min_duration(mut self, duration: Duration) -> Self {
        self.min_duration = Some(duration);
        self
    }

    /// Set maximum rendered length to display.
    pub fn max_rendered_length(mut self, len: usize) -> Self {
        self.max_rendered_length = Some(len);
        self
    }

    /// Print profile lines only.
    pub fn profile_only(mut self) -> Self {
        self.log_traces = false;
        self
    }

    /// Set prefix for log lines.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub(crate) fn truncate(&self, rendered: &str) -> String {
        match self.max_rendered_length {
            Some(max) if rendered.len() > max => {
                format!("{}...", truncate_rendered(rendered, max))
            }
            _ => rendered.to_string(),
        }
    }

    pub(crate) fn format_trace(&self, call: &CallInfo<'_>) -> String {
        format!(
            "{}   trace: {}.{}: {}",
            self.prefix,
            call.type_name,
            call.method,
            self.truncate(call.rendered)
        )
    }

    pub(crate) fn format_profile(&self, call: &CallInfo<'_>, elapsed: Duration) -> String {
        format!(
            "{} profile: {}.{}: {} {:.3} msec",
            self.prefix,
            call.type_name,
            call.method,
            self.truncate(call.rendered),
            elapsed_ms(elapsed)
        )
    }
}

impl TraceHook for LoggingObserver {
    fn on_trace(&self, call: &CallInfo<'_>) {
        if self.log_traces {
            eprintln!("{}", self.format_trace(call));
        }
    }
}

impl ProfileHook for LoggingObserver {
    fn on_profile(&self, call: &CallInfo<'_>, elapsed: Duration) {
        if let Some(min) = self.min_duration {
            if elapsed < min {
                return;
            }
        }
        eprintln!("{}", self.format_profile(call, elapsed));
    }

    fn on_slow_call(&self, call: &CallInfo<'_>, elapsed: Duration) {
        eprintln!(
            "{} SLOW CALL {}.{}: {:?} | {}",
            self.prefix,
            call.type_name,
            call.method,
            elapsed,
            self.truncate(call.rendered)
        );
    }
}

/// An observer that tracks call statistics.
#[derive(Debug, Default)]
pub struct StatsObserver {
    traced_calls: AtomicU64,
    profiled_calls: AtomicU64,
    slow_calls: AtomicU64,
    total_duration_nanos: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_call: Mutex<Option<String>>,
    per_method: Mutex<BTreeMap<String, u64>>,
}

/// Collected call statistics.
#[derive(Debug, Clone, Default)]
pub struct CallStats {
    /// Calls reported to the trace hook.
    pub traced_calls: u64,
    /// Successful calls reported to the profile hook.
    pub profiled_calls: u64,
    /// Profiled calls above the slow call threshold.
    pub slow_calls: u64,
    /// Total profiled time.
    pub total_duration: Duration,
    /// Slowest profiled call duration.
    pub max_duration: Duration,
    /// Rendered form of the slowest profiled call.
    pub slowest_call: Option<String>,
    /// Traced calls keyed by `Type.method`.
    pub per_method: BTreeMap<String, u64>,
}

impl StatsObserver {
    /// Create a new stats observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> CallStats {
        CallStats {
            traced_calls: self.traced_calls.load(Ordering::Relaxed),
            profiled_calls: self.profiled_calls.load(Ordering::Relaxed),
            slow_calls: self.slow_calls.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_call: self
                .slowest_call
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            per_method: self
                .per_method
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        self.traced_calls.store(0, Ordering::Relaxed);
        self.profiled_calls.store(0, Ordering::Relaxed);
        self.slow_calls.store(0, Ordering::Relaxed);
        self.total_duration_nanos.store(0, Ordering::Relaxed);
        self.max_duration_nanos.store(0, Ordering::Relaxed);
        *self
            .slowest_call
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.per_method
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl TraceHook for StatsObserver {
    fn on_trace(&self, call: &CallInfo<'_>) {
        self.traced_calls.fetch_add(1, Ordering::Relaxed);
        let key = format!("{}.{}", call.type_name, call.method);
        *self
            .per_method
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_insert(0) += 1;
    }
}

impl ProfileHook for StatsObserver {
    fn on_profile(&self, call: &CallInfo<'_>, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);

        self.profiled_calls.fetch_add(1, Ordering::Relaxed);
        let prev_total = self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);
        if prev_total.checked_add(nanos).is_none() {
            // Saturate instead of wrapping.
            self.total_duration_nanos.store(u64::MAX, Ordering::Relaxed);
        }

        let mut current_max = self.max_duration_nanos.load(Ordering::Relaxed);
        while nanos > current_max {
            match self.max_duration_nanos.compare_exchange_weak(
                current_max,
                nanos,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => {
                    *self
                        .slowest_call
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner) = Some(call.rendered.to_string());
                    break;
                }
                Err(updated) => current_max = updated,
            }
        }
    }

    fn on_slow_call(&self, _call: &CallInfo<'_>, _elapsed: Duration) {
        self.slow_calls.fetch_add(1, Ordering::Relaxed);
    }
}

/// An observer that delegates to several trace and profile hooks.
#[derive(Default)]
pub struct CompositeObserver {
    traces: Vec<Arc<dyn TraceHook>>,
    profiles: Vec<Arc<dyn ProfileHook>>,
}

impl CompositeObserver {
    /// Create an empty composite observer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an observer receiving both trace and profile events.
    #[allow(clippy::should_implement_trait)]
    pub fn add<O: TraceHook + ProfileHook + 'static>(mut self, observer: O) -> Self {
        let observer = Arc::new(observer);
        self.traces.push(observer.clone());
        self.profiles.push(observer);
        self
    }

    /// Add an Arc-wrapped trace hook.
    pub fn add_trace_arc(mut self, hook: Arc<dyn TraceHook>) -> Self {
        self.traces.push(hook);
        self
    }

    /// Add an Arc-wrapped profile hook.
    pub fn add_profile_arc(mut self, hook: Arc<dyn ProfileHook>) -> Self {
        self.profiles.push(hook);
        self
    }
}

impl TraceHook for CompositeObserver {
    fn on_trace(&self, call: &CallInfo<'_>) {
        for hook in &self.traces {
            hook.on_trace(call);
        }
    }
}

impl ProfileHook for CompositeObserver {
    fn on_profile(&self, call: &CallInfo<'_>, elapsed: Duration) {
        for hook in &self.profiles {
            hook.on_profile(call, elapsed);
        }
    }

    fn on_slow_call(&self, call: &CallInfo<'_>, elapsed: Duration) {
        for hook in &self.profiles {
            hook.on_slow_call(call, elapsed);
        }
    }
}
