//! Integration tests for the pulse scheduler.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::time::sleep;

use plexus_core::error::{AppError, ErrorKind};
use plexus_worker::{Task, TaskStatus};

#[tokio::test(start_paused = true)]
async fn test_bounded_failure() {
    let runtime = helpers::runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let options = runtime
        .pulse
        .options()
        .delay(Duration::from_millis(100))
        .attempts(3);
    let task = runtime.pulse.register(
        "flaky",
        move |_: Arc<Task>, _: Vec<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(false) }
        },
        options,
        vec![],
    );

    sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(task.failed());
    assert_eq!(task.attempt(), 3);
    assert_eq!(task.error().as_deref(), Some("Task callback reported failure"));
    assert_eq!(task.status(), TaskStatus::Running);
}

#[tokio::test(start_paused = true)]
async fn test_repeat_completion() {
    let runtime = helpers::runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();

    let options = runtime
        .pulse
        .options()
        .delay(Duration::from_millis(100))
        .repeat(2);
    let task = runtime.pulse.register(
        "twice",
        move |_: Arc<Task>, _: Vec<Value>| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(true) }
        },
        options,
        vec![],
    );

    sleep(Duration::from_secs(1)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(task.complete());
    assert_eq!(task.count(), 2);
    assert_eq!(task.progress(), Some(1.0));
}

#[tokio::test(start_paused = true)]
async fn test_slow_callback_never_overlaps() {
    let runtime = helpers::runtime();
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let (active_in, peak_in) = (active.clone(), peak.clone());

    let options = runtime
        .pulse
        .options()
        .delay(Duration::from_millis(10))
        .repeat(3);
    let task = runtime.pulse.register(
        "slow",
        move |_: Arc<Task>, _: Vec<Value>| {
            let active = active_in.clone();
            let peak = peak_in.clone();
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(100)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(true)
            }
        },
        options,
        vec![],
    );

    // A forced run while the scheduled one is in flight is ignored.
    sleep(Duration::from_millis(50)).await;
    task.now().await;

    sleep(Duration::from_secs(1)).await;
    assert!(task.complete());
    assert_eq!(peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_error_message_is_recorded() {
    let runtime = helpers::runtime();
    let options = runtime
        .pulse
        .options()
        .delay(Duration::from_millis(10))
        .attempts(1);
    let task = runtime.pulse.register(
        "broken",
        |_: Arc<Task>, params: Vec<Value>| async move {
            Err(AppError::task(format!("cannot reach {}", params[0])))
        },
        options,
        vec![json!("db")],
    );

    sleep(Duration::from_millis(50)).await;
    assert!(task.failed());
    let error = task.error().unwrap_or_default();
    assert!(error.starts_with("TASK: cannot reach \"db\""), "{error}");
}

#[tokio::test(start_paused = true)]
async fn test_stop_by_id_and_unknown_ids() {
    let runtime = helpers::runtime();
    let options = runtime.pulse.options().delay(Duration::from_millis(100));
    let task = runtime.pulse.register(
        "idle",
        |_: Arc<Task>, _: Vec<Value>| async { Ok(true) },
        options,
        vec![],
    );

    runtime.pulse.stop("idle").unwrap();
    sleep(Duration::from_secs(1)).await;
    assert_eq!(task.count(), 0);
    assert_eq!(task.status(), TaskStatus::Stopped);

    let err = runtime.pulse.start("missing").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);

    assert!(runtime.pulse.unregister("idle").await);
    assert!(!runtime.pulse.unregister("idle").await);
    assert!(runtime.pulse.is_empty());
}
