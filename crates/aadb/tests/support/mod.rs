//! A scripted callback-style driver for integration tests.
//!
//! Responses are keyed by SQL text. Completions fire from a spawned tokio task
//! after an optional delay, the way a real driver reports from its worker thread.

#![allow(dead_code)]

use aadb::{Arg, CallbackHandle, Completion, DriverError, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One call as seen by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub handle: String,
    pub method: String,
    pub args: Vec<Value>,
}

#[derive(Default)]
pub struct Script {
    responses: Mutex<HashMap<String, Result<Value, DriverError>>>,
    calls: Mutex<Vec<RecordedCall>>,
    delay: Option<Duration>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn respond(&self, sql: &str, result: Result<Value, DriverError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(sql.to_string(), result);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, handle: &str, method: &str, args: &[Arg]) {
        self.calls.lock().unwrap().push(RecordedCall {
            handle: handle.to_string(),
            method: method.to_string(),
            args: args.iter().filter_map(Arg::as_value).cloned().collect(),
        });
    }

    fn response(&self, sql: Option<&str>) -> Result<Value, DriverError> {
        let Some(sql) = sql else {
            return Ok(Value::Null);
        };
        self.responses
            .lock()
            .unwrap()
            .get(sql)
            .cloned()
            .unwrap_or(Ok(Value::Null))
    }

    fn complete(&self, done: Completion, result: Result<Value, DriverError>) {
        let delay = self.delay;
        tokio::spawn(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            done.settle(result);
        });
    }
}

fn sql_of(args: &[Arg]) -> Option<&str> {
    args.first()
        .and_then(Arg::as_value)
        .and_then(Value::as_str)
}

pub struct ScriptedDatabase {
    script: Arc<Script>,
}

impl ScriptedDatabase {
    pub fn open(script: &Arc<Script>) -> Arc<dyn CallbackHandle> {
        Arc::new(Self {
            script: script.clone(),
        })
    }
}

impl CallbackHandle for ScriptedDatabase {
    fn type_name(&self) -> &str {
        "Database"
    }

    fn has_method(&self, name: &str) -> bool {
        matches!(
            name,
            "run" | "exec" | "get" | "all" | "each" | "map" | "close" | "prepare" | "interrupt"
        )
    }

    fn call(&self, method: &str, args: Vec<Arg>, done: Completion) -> Result<(), DriverError> {
        self.script.record("Database", method, &args);
        let result = self.script.response(sql_of(&args));
        self.script.complete(done, result);
        Ok(())
    }

    fn prepare(
        &self,
        args: Vec<Arg>,
        done: Completion,
    ) -> Result<Option<Arc<dyn CallbackHandle>>, DriverError> {
        self.script.record("Database", "prepare", &args);
        let sql = sql_of(&args).unwrap_or_default().to_string();
        let statement: Arc<dyn CallbackHandle> = Arc::new(ScriptedStatement {
            script: self.script.clone(),
            sql,
        });
        self.script.complete(done, Ok(Value::Null));
        Ok(Some(statement))
    }
}

pub struct ScriptedStatement {
    script: Arc<Script>,
    sql: String,
}

impl CallbackHandle for ScriptedStatement {
    fn type_name(&self) -> &str {
        "Statement"
    }

    fn has_method(&self, name: &str) -> bool {
        matches!(
            name,
            "run" | "get" | "all" | "each" | "map" | "bind" | "reset" | "finalize"
        )
    }

    fn call(&self, method: &str, args: Vec<Arg>, done: Completion) -> Result<(), DriverError> {
        self.script.record("Statement", method, &args);
        let result = match method {
            "bind" | "reset" | "finalize" => Ok(Value::Null),
            _ => self.script.response(Some(&self.sql)),
        };
        self.script.complete(done, result);
        Ok(())
    }
}

/// Collects trace/profile lines in the format of the logging observer.
#[derive(Clone, Default)]
pub struct Lines(Arc<Mutex<Vec<String>>>);

impl Lines {
    pub fn push(&self, line: String) {
        self.0.lock().unwrap().push(line);
    }

    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.0.lock().unwrap())
    }
}
