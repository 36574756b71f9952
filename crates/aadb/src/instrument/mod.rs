//! Instrumentation of callback-style handles.
//!
//! This module provides:
//! - An identity guard so each driver handle is instrumented once
//! - An awaitable facade over the handle's callback methods
//! - Trace and profile hooks receiving a rendered form of each call
//! - Propagation of `prepare`/`bind` parameters into statement traces
//!
//! # Example
//!
//! ```rust,ignore
//! use aadb::args;
//! use aadb::instrument::{AdapterOptions, LoggingObserver, instrument};
//!
//! let db = instrument(driver.open("./test.db"), AdapterOptions::new().with_observer(LoggingObserver::new()));
//!
//! db.exec(args!["CREATE TABLE IF NOT EXISTS users(name TEXT, age INTEGER)"]).await?;
//! db.run(args!["INSERT INTO users(name, age) VALUES(?, ?)", "Leo", 13]).await?;
//!
//! let st = db.prepare(args!["SELECT * FROM users WHERE name = ?"]).await?;
//! let row = st.get(args!["Leo"]).await?;
//! st.finalize().await?;
//! db.close().await?;
//! ```

mod config;
mod guard;
mod hooks;
mod instrumented;
mod observers;
mod render;

#[cfg(feature = "tracing")]
mod tracing_hook;


pub use config::{AdapterOptions, DEFAULT_ASYNC_METHODS, DEFAULT_TRACE_METHODS, MethodLists};
pub use guard::{guard, is_instrumented};
pub use hooks::{CallInfo, ProfileHook, TraceHook, elapsed_ms};
pub use instrumented::{Instrumented, instrument, try_instrument};
pub use observers::{CallStats, CompositeObserver, LoggingObserver, StatsObserver};
pub use render::render_call;

#[cfg(feature = "tracing")]
pub use tracing_hook::TracingCallHook;

pub(crate) fn truncate_rendered(rendered: &str, max_bytes: usize) -> &str {
    if rendered.len() <= max_bytes {
        return rendered;
    }
    let mut end = max_bytes;
    while end > 0 && !rendered.is_char_boundary(end) {
        end -= 1;
    }
    &rendered[..end]
}
