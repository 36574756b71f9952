//! # aadb
//!
//! Await callback-style database drivers.
//!
//! ## Features
//!
//! - **Awaitable facade**: driver methods that report through a trailing completion
//!   callback become futures
//! - **Instrument once**: handles are tracked by identity, so instrumenting the same
//!   handle twice returns the same facade
//! - **Lazy or eager**: awaitables start the driver call on first poll (default) or
//!   immediately
//! - **Trace and profile hooks**: every traced call is rendered as
//!   `SQL; param; param` and reported before and after execution
//! - **Statement context**: statements created by `prepare` remember the parameters
//!   they were prepared and bound with, so their traces are complete
//!
//! ## Example
//!
//! ```ignore
//! use aadb::{AdapterOptions, LoggingObserver, args, instrument};
//!
//! let db = instrument(
//!     driver.open("./test.db")?,
//!     AdapterOptions::new().with_observer(LoggingObserver::new()),
//! );
//!
//! db.run(args!["INSERT INTO users(name, age) VALUES(?, ?)", "Kaz", 57]).await?;
//!
//! let st = db.prepare(args!["SELECT * FROM users WHERE name = ?"]).await?;
//! st.bind(args!["Kaz"]).await?;
//! let rows = st.all(args![]).await?;
//! st.finalize().await?;
//! ```

pub mod args;
pub mod awaitable;
pub mod driver;
pub mod error;
pub mod instrument;

pub use args::{Arg, RowCallback};
pub use awaitable::{AwaitMode, Awaitable};
pub use driver::{CallbackHandle, Completion};
pub use error::{AdapterError, AdapterResult, DriverError};
pub use instrument::{
    AdapterOptions, CallInfo, CallStats, CompositeObserver, Instrumented, LoggingObserver,
    MethodLists, ProfileHook, StatsObserver, TraceHook, instrument, try_instrument,
};

#[cfg(feature = "tracing")]
pub use instrument::TracingCallHook;

// Re-export serde_json so drivers and callers agree on the value type.
pub use serde_json;
pub use serde_json::Value;
