use super::hooks::{CallInfo, ProfileHook, TraceHook, elapsed_ms};
use super::truncate_rendered;
use std::time::Duration;
use tracing::Level;

/// A `tracing`-based observer for instrumented calls.
///
/// Trace events are emitted before the driver call, profile events after a
/// successful completion, both on target `aadb.call`. Slow calls are emitted at
/// `WARN` regardless of the configured level.
///
/// Enable via the crate feature: `aadb = { features = ["tracing"] }`.
#[derive(Debug, Clone)]
pub struct TracingCallHook {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long rendered calls (in bytes). `None` means no truncation.
    pub max_rendered_length: Option<usize>,
}

impl Default for TracingCallHook {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_rendered_length: Some(200),
        }
    }
}

impl TracingCallHook {
    /// Create a new hook with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum rendered length to display.
    pub fn max_rendered_length(mut self, len: usize) -> Self {
        self.max_rendered_length = Some(len);
        self
    }

    /// Disable truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_rendered_length = None;
        self
    }

    fn truncate<'a>(&self, rendered: &'a str) -> std::borrow::Cow<'a, str> {
        match self.max_rendered_length {
            Some(max) if rendered.len() > max => {
                format!("{}...", truncate_rendered(rendered, max)).into()
            }
            _ => rendered.into(),
        }
    }
}

/// Dispatch a tracing event at a runtime-determined level.
macro_rules! emit_at_level {
    ($level:expr, $($field:tt)*) => {
        match $level {
            Level::ERROR => tracing::error!($($field)*),
            Level::WARN  => tracing::warn!($($field)*),
            Level::INFO  => tracing::info!($($field)*),
            Level::DEBUG => tracing::debug!($($field)*),
            Level::TRACE => tracing::trace!($($field)*),
        }
    };
}

impl TraceHook for TracingCallHook {
    fn on_trace(&self, call: &CallInfo<'_>) {
        let rendered = self.truncate(call.rendered);
        emit_at_level!(
            self.level,
            target: "aadb.call",
            handle = call.type_name,
            method = call.method,
            call = %rendered,
            "trace"
        );
    }
}

impl ProfileHook for TracingCallHook {
    fn on_profile(&self, call: &CallInfo<'_>, elapsed: Duration) {
        let rendered = self.truncate(call.rendered);
        emit_at_level!(
            self.level,
            target: "aadb.call",
            handle = call.type_name,
            method = call.method,
            call = %rendered,
            elapsed_ms = elapsed_ms(elapsed),
            "profile"
        );
    }

    fn on_slow_call(&self, call: &CallInfo<'_>, elapsed: Duration) {
        tracing::warn!(
            target: "aadb.call",
            handle = call.type_name,
            method = call.method,
            call = %self.truncate(call.rendered),
            elapsed_ms = elapsed_ms(elapsed),
            "slow call"
        );
    }
}
