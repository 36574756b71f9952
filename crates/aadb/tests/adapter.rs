//! Database-level calls through the adapter with a driver that completes asynchronously.

mod support;

use aadb::{
    AdapterError, AdapterOptions, CompositeObserver, DriverError, StatsObserver, args, instrument,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use support::{Lines, RecordedCall, Script, ScriptedDatabase};

#[tokio::test]
async fn awaits_asynchronous_completions() {
    let script = Script::new();
    script.respond("SELECT * FROM users", Ok(json!([{"name": "Kaz", "age": 57}])));
    let db = instrument(ScriptedDatabase::open(&script), AdapterOptions::new());

    let rows = db.all(args!["SELECT * FROM users"]).await.unwrap();
    assert_eq!(rows, json!([{"name": "Kaz", "age": 57}]));
    assert_eq!(
        script.calls(),
        [RecordedCall {
            handle: "Database".into(),
            method: "all".into(),
            args: vec![json!("SELECT * FROM users")],
        }]
    );
}

#[tokio::test]
async fn concurrent_calls_on_one_handle() {
    let script = Script::with_delay(Duration::from_millis(5));
    script.respond(
        "SELECT * FROM users WHERE name = $name",
        Ok(json!({"name": "Leo", "age": 13})),
    );
    script.respond(
        "SELECT * FROM users WHERE name = ?",
        Ok(json!({"name": "Kaz", "age": 57})),
    );
    let db = instrument(ScriptedDatabase::open(&script), AdapterOptions::new());

    let results = futures_util::future::join_all([
        db.get(args![
            "SELECT * FROM users WHERE name = $name",
            json!({"$name": "Leo"})
        ]),
        db.get(args!["SELECT * FROM users WHERE name = ?", "Kaz"]),
    ])
    .await;

    let rows: Vec<_> = results.into_iter().map(Result::unwrap).collect();
    assert_eq!(
        rows,
        [json!({"name": "Leo", "age": 13}), json!({"name": "Kaz", "age": 57})]
    );
}

#[tokio::test]
async fn driver_errors_reach_the_caller_unchanged() {
    let script = Script::new();
    let err = DriverError::with_code(
        "SQLITE_CONSTRAINT",
        "UNIQUE constraint failed: users.name",
    );
    script.respond("INSERT INTO users(name) VALUES(?)", Err(err.clone()));

    let stats = Arc::new(StatsObserver::new());
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new()
            .with_trace_arc(stats.clone())
            .with_profile_arc(stats.clone()),
    );

    let got = db
        .run(args!["INSERT INTO users(name) VALUES(?)", "Leo"])
        .await
        .unwrap_err();
    assert_eq!(got, AdapterError::Driver(err));
    assert_eq!(stats.stats().traced_calls, 1);
    assert_eq!(stats.stats().profiled_calls, 0);
}

#[tokio::test]
async fn eager_calls_start_without_being_awaited() {
    let script = Script::with_delay(Duration::from_millis(5));
    script.respond("SELECT 1", Ok(json!({"1": 1})));
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new().use_promise(true),
    );

    let pending = db.get(args!["SELECT 1"]);
    let _ignored = db.run(args!["UPDATE users SET age = age + 1"]);
    assert_eq!(script.calls().len(), 2);

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(pending.await.unwrap(), json!({"1": 1}));
}

#[tokio::test]
async fn lazy_calls_wait_for_the_consumer() {
    let script = Script::new();
    let db = instrument(ScriptedDatabase::open(&script), AdapterOptions::new());

    let pending = db.exec(args!["DROP TABLE IF EXISTS users"]);
    tokio::time::sleep(Duration::from_millis(5)).await;
    assert!(script.calls().is_empty());

    pending.await.unwrap();
    assert_eq!(script.calls().len(), 1);
}

#[tokio::test]
async fn profile_measures_driver_latency() {
    let script = Script::with_delay(Duration::from_millis(20));
    let stats = Arc::new(StatsObserver::new());
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new()
            .with_profile_arc(stats.clone())
            .with_slow_call_threshold(Duration::from_millis(5)),
    );

    db.all(args!["SELECT * FROM users"]).await.unwrap();

    let snapshot = stats.stats();
    assert_eq!(snapshot.profiled_calls, 1);
    assert_eq!(snapshot.slow_calls, 1);
    assert!(snapshot.max_duration >= Duration::from_millis(20));
    assert_eq!(snapshot.slowest_call.as_deref(), Some("SELECT * FROM users"));
}

#[tokio::test]
async fn fast_calls_are_not_slow() {
    let script = Script::new();
    let stats = Arc::new(StatsObserver::new());
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new()
            .with_profile_arc(stats.clone())
            .with_slow_call_threshold(Duration::from_secs(3600)),
    );

    db.get(args!["SELECT 1"]).await.unwrap();
    assert_eq!(stats.stats().profiled_calls, 1);
    assert_eq!(stats.stats().slow_calls, 0);
}

#[tokio::test]
async fn trace_and_profile_lines() {
    let script = Script::new();
    let lines = Lines::default();
    let trace_lines = lines.clone();
    let profile_lines = lines.clone();
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new()
            .with_trace(move |sql: &str, method: &str, ty: &str| {
                trace_lines.push(format!("  trace: {ty}.{method}: {sql}"));
            })
            .with_profile(move |sql: &str, _: Duration, method: &str, ty: &str| {
                profile_lines.push(format!("profile: {ty}.{method}: {sql}"));
            }),
    );

    db.exec(args!["BEGIN IMMEDIATE"]).await.unwrap();
    db.run(args!["INSERT INTO users(name, age) VALUES(?, ?)", "Kaz", 57])
        .await
        .unwrap();
    db.run(args![
        "INSERT INTO users(name, age) VALUES($name, $age)",
        json!({"$name": "Leo", "$age": 13})
    ])
    .await
    .unwrap();
    db.close().await.unwrap();

    assert_eq!(
        lines.take(),
        [
            "  trace: Database.exec: BEGIN IMMEDIATE",
            "profile: Database.exec: BEGIN IMMEDIATE",
            r#"  trace: Database.run: INSERT INTO users(name, age) VALUES(?, ?); "Kaz"; 57"#,
            r#"profile: Database.run: INSERT INTO users(name, age) VALUES(?, ?); "Kaz"; 57"#,
            r#"  trace: Database.run: INSERT INTO users(name, age) VALUES($name, $age); {"$age":13,"$name":"Leo"}"#,
            r#"profile: Database.run: INSERT INTO users(name, age) VALUES($name, $age); {"$age":13,"$name":"Leo"}"#,
        ]
    );
}

#[cfg(feature = "tracing")]
#[tokio::test]
async fn tracing_hook_composes_with_stats() {
    let script = Script::new();
    let stats = Arc::new(StatsObserver::new());
    let observer = CompositeObserver::new()
        .add(aadb::TracingCallHook::new())
        .add_trace_arc(stats.clone())
        .add_profile_arc(stats.clone());
    let db = instrument(
        ScriptedDatabase::open(&script),
        AdapterOptions::new().with_observer(observer),
    );

    db.map(args!["SELECT * FROM users"]).await.unwrap();
    assert_eq!(stats.stats().per_method.get("Database.map"), Some(&1));
}

#[tokio::test]
async fn unconfigured_methods_stay_callback_only() {
    let script = Script::new();
    let db = instrument(ScriptedDatabase::open(&script), AdapterOptions::new());

    assert!(!db.is_awaitable("interrupt"));
    assert!(db.inner().has_method("interrupt"));
    assert!(matches!(
        db.call("interrupt", args![]).await,
        Err(AdapterError::UnknownMethod(_))
    ));
}
