//! Integration tests for the runtime as a whole.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;

use helpers::EventLog;
use plexus::Runtime;
use plexus_core::{ObjectPath, Priority};
use plexus_plugin::{HookContext, HookOptions};
use plexus_worker::{Task, TaskStatus};

#[tokio::test(start_paused = true)]
async fn test_shutdown_stops_tasks_and_clears_cache() {
    let runtime = helpers::runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    let task = runtime.pulse.register(
        "tick",
        move |_: Arc<Task>, _: Vec<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        },
        runtime.pulse.options().delay(Duration::from_millis(100)),
        vec![],
    );

    let fired = Arc::new(AtomicBool::new(false));
    let flag = fired.clone();
    runtime.cache.set_with_callback(
        "session",
        "token",
        Duration::from_millis(50),
        move |_: &ObjectPath, _: &Value| flag.store(true, Ordering::SeqCst),
    );

    runtime.shutdown();
    sleep(Duration::from_secs(1)).await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(task.status(), TaskStatus::Stopped);
    assert_eq!(runtime.cache.size(), 0);
    assert!(!fired.load(Ordering::SeqCst));
}

#[tokio::test(start_paused = true)]
async fn test_configuration_reaches_every_primitive() {
    let runtime = helpers::runtime_with(|config| {
        config.hooks.default_order = Priority::Lowest.value();
        config.cache.default_ttl_ms = 100;
        config.pulse.delay_ms = 20;
        config.pulse.repeat = 1;
    });

    let options = runtime.pulse.options();
    assert_eq!(options.delay, Duration::from_millis(20));
    assert_eq!(options.repeat, 1);

    runtime.cache.set_default("draft", json!({"title": "x"}));
    sleep(Duration::from_millis(150)).await;
    assert!(!runtime.cache.contains("draft"));

    runtime
        .hooks
        .register_sync(
            "h",
            |_: &[Value], ctx: &mut HookContext| {
                ctx.set("last", "default");
                Ok(())
            },
            HookOptions::new(),
        )
        .unwrap();
    runtime
        .hooks
        .register_sync(
            "h",
            |_: &[Value], ctx: &mut HookContext| {
                ctx.set("last", "low");
                Ok(())
            },
            HookOptions::new().order(Priority::Low),
        )
        .unwrap();

    let ctx = runtime.dispatcher.run("h", vec![]).await.unwrap();
    assert_eq!(ctx.get_str("last"), Some("default"));
}

#[tokio::test(start_paused = true)]
async fn test_task_feeds_cache_through_hook() {
    let runtime = Runtime::default();
    runtime
        .hooks
        .register_sync(
            "normalize",
            |params: &[Value], ctx: &mut HookContext| {
                let raw = params.first().and_then(Value::as_str).unwrap_or_default();
                ctx.set("value", raw.to_uppercase());
                Ok(())
            },
            HookOptions::new(),
        )
        .unwrap();
    let log = EventLog::subscribe(&runtime, "inbox");

    let shared = runtime.clone();
    let options = runtime
        .pulse
        .options()
        .delay(Duration::from_millis(10))
        .repeat(2);
    let task = runtime.pulse.register(
        "ingest",
        move |task: Arc<Task>, params: Vec<Value>| {
            let runtime = shared.clone();
            async move {
                let ctx = runtime.dispatcher.run("normalize", params).await?;
                let slot = ObjectPath::from(vec!["inbox".to_string(), task.count().to_string()]);
                runtime.cache.set(slot, ctx.get("value").cloned().unwrap_or_default());
                Ok(true)
            }
        },
        options,
        vec![json!("hello")],
    );

    sleep(Duration::from_millis(100)).await;
    assert!(task.complete());
    assert_eq!(runtime.cache.get("inbox"), Some(json!(["HELLO", "HELLO"])));
    assert_eq!(log.ops(), vec!["set", "set"]);
}
