//! Human-readable rendering of instrumented calls.
//!
//! The rendered form is for logs only. It is never parsed back and never used
//! to compare calls.

use crate::args::Arg;
use serde_json::Value;
use std::fmt::Write as _;

/// Render a call's arguments, prefixed by inherited or bound parameters.
///
/// Callback arguments are dropped. The first remaining element is written as-is
/// when it is a string (usually the SQL text, or the already rendered prefix);
/// every other element is written as compact JSON. Elements are joined by `"; "`.
/// An empty prefix counts as no prefix.
pub fn render_call(prefix: Option<&str>, args: &[Arg]) -> String {
    let mut out = String::new();
    let mut first = true;

    if let Some(prefix) = prefix.filter(|p| !p.is_empty()) {
        out.push_str(prefix);
        first = false;
    }

    for value in args.iter().filter_map(Arg::as_value) {
        match value {
            Value::String(s) if first => out.push_str(s),
            _ => {
                if !first {
                    out.push_str("; ");
                }
                // Writing into a String cannot fail.
                let _ = write!(out, "{value}");
            }
        }
        first = false;
    }

    out
}
