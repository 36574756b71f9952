//! Example demonstrating trace/profile output over a callback-style driver.
//!
//! Run with:
//!   cargo run --example trace_profile -p aadb
//!
//! The driver here keeps a `users` table in memory and reports every call from a
//! worker thread, the way native drivers do. Set `RUST_LOG=aadb=debug` to see the
//! `tracing` events next to the stderr lines.

use aadb::{
    AdapterOptions, AdapterResult, Arg, CallbackHandle, Completion, CompositeObserver,
    DriverError, LoggingObserver, StatsObserver, TracingCallHook, Value, args, instrument,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Default)]
struct Table {
    rows: Mutex<Vec<Value>>,
}

impl Table {
    fn execute(&self, params: &[Value]) -> Result<Value, DriverError> {
        let mut rows = self.rows.lock().map_err(|_| DriverError::new("table poisoned"))?;
        match params {
            [Value::String(sql), name, age] if sql.starts_with("INSERT") => {
                rows.push(json!({ "name": name, "age": age }));
                Ok(json!({ "changes": 1, "lastID": rows.len() }))
            }
            [Value::String(sql), name] if sql.starts_with("SELECT") => Ok(Value::Array(
                rows.iter().filter(|row| row["name"] == *name).cloned().collect(),
            )),
            [Value::String(sql)] if sql.starts_with("SELECT") => Ok(Value::Array(rows.clone())),
            [Value::String(sql), ..] => Err(DriverError::with_code(
                "SQLITE_ERROR",
                format!("unsupported statement: {sql}"),
            )),
            _ => Ok(Value::Null),
        }
    }
}

fn complete_later(done: Completion, result: Result<Value, DriverError>) {
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(2));
        done.settle(result);
    });
}

fn values(args: &[Arg]) -> Vec<Value> {
    args.iter().filter_map(Arg::as_value).cloned().collect()
}

struct MemoryDatabase {
    table: Arc<Table>,
}

impl CallbackHandle for MemoryDatabase {
    fn type_name(&self) -> &str {
        "Database"
    }

    fn has_method(&self, name: &str) -> bool {
        matches!(name, "run" | "exec" | "get" | "all" | "close" | "prepare")
    }

    fn call(&self, method: &str, args: Vec<Arg>, done: Completion) -> Result<(), DriverError> {
        let result = match method {
            "get" => self
                .table
                .execute(&values(&args))
                .map(|rows| rows.get(0).cloned().unwrap_or(Value::Null)),
            "close" => Ok(Value::Null),
            _ => self.table.execute(&values(&args)),
        };
        complete_later(done, result);
        Ok(())
    }

    fn prepare(
        &self,
        args: Vec<Arg>,
        done: Completion,
    ) -> Result<Option<Arc<dyn CallbackHandle>>, DriverError> {
        let statement = MemoryStatement {
            table: Arc::clone(&self.table),
            sql: values(&args),
            bound: Mutex::new(Vec::new()),
        };
        complete_later(done, Ok(Value::Null));
        Ok(Some(Arc::new(statement)))
    }
}

struct MemoryStatement {
    table: Arc<Table>,
    sql: Vec<Value>,
    bound: Mutex<Vec<Value>>,
}

impl CallbackHandle for MemoryStatement {
    fn type_name(&self) -> &str {
        "Statement"
    }

    fn has_method(&self, name: &str) -> bool {
        matches!(name, "run" | "all" | "bind" | "reset" | "finalize")
    }

    fn call(&self, method: &str, args: Vec<Arg>, done: Completion) -> Result<(), DriverError> {
        let mut bound = self
            .bound
            .lock()
            .map_err(|_| DriverError::new("statement poisoned"))?;
        let result = match method {
            "bind" => {
                *bound = values(&args);
                Ok(Value::Null)
            }
            "reset" | "finalize" => Ok(Value::Null),
            _ => {
                let mut params = self.sql.clone();
                params.extend(bound.iter().cloned());
                params.extend(values(&args));
                self.table.execute(&params)
            }
        };
        complete_later(done, result);
        Ok(())
    }
}

#[tokio::main]
async fn main() -> AdapterResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let stats = Arc::new(StatsObserver::new());
    let observer = CompositeObserver::new()
        .add(LoggingObserver::new().prefix("[aadb-demo]"))
        .add(TracingCallHook::new())
        .add_trace_arc(stats.clone())
        .add_profile_arc(stats.clone());

    let db = instrument(
        Arc::new(MemoryDatabase {
            table: Arc::new(Table::default()),
        }),
        AdapterOptions::new()
            .with_observer(observer)
            .trace_methods(["run", "exec", "get", "all", "bind"])
            .with_slow_call_threshold(Duration::from_millis(1)),
    );

    // 1) Plain calls on the database handle
    db.run(args!["INSERT INTO users(name, age) VALUES(?, ?)", "Kaz", 57])
        .await?;
    db.run(args!["INSERT INTO users(name, age) VALUES(?, ?)", "Leo", 13])
        .await?;
    let leo = db.get(args!["SELECT * FROM users WHERE name = ?", "Leo"]).await?;
    println!("leo = {leo}");

    // 2) A prepared statement: its traces carry the prepare and bind arguments
    let st = db
        .prepare(args!["SELECT * FROM users WHERE name = ?"])
        .await?;
    st.bind(args!["Kaz"]).await?;
    let rows = st.all(args![]).await?;
    println!("kaz = {rows}");
    st.finalize().await?;

    // 3) Driver errors come back unchanged
    match db.exec(args!["VACUUM"]).await {
        Ok(_) => println!("unexpected: VACUUM succeeded"),
        Err(e) => println!("driver error as expected: {e}"),
    }

    db.close().await?;

    let s = stats.stats();
    println!("\n=== Call Statistics ===");
    println!("Traced calls: {}", s.traced_calls);
    println!("Profiled calls: {}", s.profiled_calls);
    println!("Slow calls: {}", s.slow_calls);
    println!("Total time: {:?}", s.total_duration);
    println!("Max time: {:?}", s.max_duration);
    if let Some(call) = &s.slowest_call {
        println!("Slowest call: {call}");
    }
    for (method, count) in &s.per_method {
        println!("  {method}: {count}");
    }

    Ok(())
}
