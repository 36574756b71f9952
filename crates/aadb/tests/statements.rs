//! Prepared statements: parameter context carried from `prepare` and `bind` into traces.

mod support;

use aadb::{
    AdapterError, AdapterOptions, Arg, DriverError, RowCallback, Value, args, instrument,
};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{Lines, Script, ScriptedDatabase};

fn traced(lines: &Lines) -> AdapterOptions {
    let trace_lines = lines.clone();
    let profile_lines = lines.clone();
    AdapterOptions::new()
        .with_trace(move |sql: &str, method: &str, ty: &str| {
            trace_lines.push(format!("  trace: {ty}.{method}: {sql}"));
        })
        .with_profile(move |sql: &str, _: Duration, method: &str, ty: &str| {
            profile_lines.push(format!("profile: {ty}.{method}: {sql}"));
        })
}

#[tokio::test]
async fn prepare_bind_all_finalize() {
    let script = Script::with_delay(Duration::from_millis(1));
    script.respond(
        "SELECT * FROM users WHERE name = ?",
        Ok(json!([{"name": "Kaz", "age": 57}])),
    );
    let lines = Lines::default();
    let db = instrument(ScriptedDatabase::open(&script), traced(&lines));

    let st = db
        .prepare(args!["SELECT * FROM users WHERE name = ?"])
        .await
        .unwrap();
    assert_eq!(st.type_name(), "Statement");
    assert_eq!(
        st.inherited_params().as_deref(),
        Some("SELECT * FROM users WHERE name = ?")
    );

    st.bind(args!["Kaz"]).await.unwrap();
    let rows = st.all(args![]).await.unwrap();
    assert_eq!(rows, json!([{"name": "Kaz", "age": 57}]));
    st.finalize().await.unwrap();

    // `bind` is not a trace method by default, so its values stay out of traces.
    assert_eq!(st.bound_params(), None);
    assert_eq!(
        lines.take(),
        [
            "  trace: Statement.all: SELECT * FROM users WHERE name = ?",
            "profile: Statement.all: SELECT * FROM users WHERE name = ?",
        ]
    );
    let methods: Vec<_> = script.calls().into_iter().map(|c| c.method).collect();
    assert_eq!(methods, ["prepare", "bind", "all", "finalize"]);
}

#[tokio::test]
async fn prepare_with_params_then_get() {
    let script = Script::new();
    script.respond(
        "SELECT * FROM users WHERE age > ?",
        Ok(json!({"name": "Kaz", "age": 57})),
    );
    let lines = Lines::default();
    let db = instrument(ScriptedDatabase::open(&script), traced(&lines));

    let st = db
        .prepare(args!["SELECT * FROM users WHERE age > ?", 18])
        .await
        .unwrap();
    let row = st.get(args![]).await.unwrap();
    assert_eq!(row["name"], "Kaz");

    let again = st.get(args![]).await.unwrap();
    assert_eq!(again, row);

    assert_eq!(
        lines.take(),
        [
            "  trace: Statement.get: SELECT * FROM users WHERE age > ?; 18",
            "profile: Statement.get: SELECT * FROM users WHERE age > ?; 18",
            "  trace: Statement.get: SELECT * FROM users WHERE age > ?; 18",
            "profile: Statement.get: SELECT * FROM users WHERE age > ?; 18",
        ]
    );
}

#[tokio::test]
async fn rebinding_replaces_rendered_params() {
    let script = Script::new();
    let lines = Lines::default();
    let db = instrument(
        ScriptedDatabase::open(&script),
        traced(&lines).trace_methods(["run", "bind"]),
    );

    let st = db
        .prepare(args!["INSERT INTO users(name, age) VALUES(?, ?)"])
        .await
        .unwrap();
    for (name, age) in [("Kaz", 57), ("Leo", 13)] {
        st.bind(args![name, age]).await.unwrap();
        st.run(args![]).await.unwrap();
        st.reset().await.unwrap();
    }
    st.finalize().await.unwrap();

    let traces: Vec<_> = lines
        .take()
        .into_iter()
        .filter(|line| line.starts_with("  trace: Statement.run"))
        .collect();
    assert_eq!(
        traces,
        [
            r#"  trace: Statement.run: INSERT INTO users(name, age) VALUES(?, ?); "Kaz"; 57"#,
            r#"  trace: Statement.run: INSERT INTO users(name, age) VALUES(?, ?); "Leo"; 13"#,
        ]
    );
    assert_eq!(
        st.bound_params().as_deref(),
        Some(r#"INSERT INTO users(name, age) VALUES(?, ?); "Leo"; 13"#)
    );
}

#[tokio::test]
async fn each_streams_rows_then_resolves() {
    let script = Script::new();
    script.respond("SELECT name FROM users", Ok(json!(2)));
    let db = instrument(ScriptedDatabase::open(&script), AdapterOptions::new());
    let st = db.prepare(args!["SELECT name FROM users"]).await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let on_row: RowCallback = {
        let seen = Arc::clone(&seen);
        Arc::new(move |_: Option<&DriverError>, row: &Value| {
            seen.lock().unwrap().push(row.clone())
        })
    };
    let count = st.each(vec![Arg::from(on_row)]).await.unwrap();

    // The scripted driver never produces rows; only the final count is delivered.
    assert_eq!(count, json!(2));
    assert!(seen.lock().unwrap().is_empty());
    assert!(script.calls()[1].args.is_empty());
}

#[tokio::test]
async fn statements_share_the_database_options() {
    let script = Script::new();
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new().async_methods(["get", "finalize"]),
    );
    let st = db.prepare(args!["SELECT 1"]).await.unwrap();

    assert!(st.is_awaitable("get"));
    assert!(st.is_awaitable("finalize"));
    assert!(!st.is_awaitable("all"));
    assert!(matches!(
        st.all(args![]).await,
        Err(AdapterError::UnknownMethod(name)) if name == "Statement.all"
    ));
    assert!(!st.is_awaitable("prepare"));
}

#[tokio::test]
async fn statement_handles_are_registered() {
    let script = Script::new();
    let db = instrument(ScriptedDatabase::open(&script), AdapterOptions::new());
    let st = db.prepare(args!["SELECT 1"]).await.unwrap();

    assert!(aadb::instrument::is_instrumented(st.inner()));
    let again = instrument(Arc::clone(st.inner()), AdapterOptions::new());
    assert!(aadb::Instrumented::ptr_eq(&st, &again));
}
