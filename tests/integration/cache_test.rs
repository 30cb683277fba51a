//! Integration tests for the runtime cache.

mod helpers;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Duration as TimeDelta, Utc};
use serde_json::{Value, json};
use tokio::time::sleep;

use helpers::EventLog;
use plexus_cache::{CacheEvent, Deletion, MergeEntry, MergeOptions};
use plexus_core::ObjectPath;

#[tokio::test(start_paused = true)]
async fn test_round_trip() {
    let runtime = helpers::runtime();
    runtime.cache.set("foo.bar", 123);

    assert_eq!(runtime.cache.get("foo.bar"), Some(json!(123)));
    assert_eq!(runtime.cache.get("foo"), Some(json!({"bar": 123})));
    assert_eq!(runtime.cache.get(["foo", "bar"]), Some(json!(123)));
}

#[tokio::test(start_paused = true)]
async fn test_expiry_removes_value_and_notifies_once() {
    let runtime = helpers::runtime();
    runtime
        .cache
        .set_with_timeout("temp", "x", Duration::from_millis(50));
    let log = EventLog::subscribe(&runtime, "temp");

    sleep(Duration::from_millis(60)).await;
    assert_eq!(runtime.cache.get("temp"), None);
    assert_eq!(
        log.events(),
        vec![CacheEvent::Expire {
            key: ObjectPath::parse("temp")
        }]
    );

    sleep(Duration::from_millis(200)).await;
    assert_eq!(log.events().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_subscription_scope() {
    let runtime = helpers::runtime();
    let foo = EventLog::subscribe(&runtime, "foo");
    let bar = EventLog::subscribe(&runtime, "bar");

    runtime.cache.set("foo.bar", 1);
    runtime.cache.del("foo.bar");
    runtime.cache.clear();

    assert_eq!(foo.ops(), vec!["set", "del", "clear"]);
    assert_eq!(bar.ops(), vec!["clear"]);

    let seen = foo.events.clone();
    assert!(foo.subscription.unsubscribe());
    runtime.cache.set("foo", 2);
    assert_eq!(seen.lock().unwrap().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_del_reports_what_remains() {
    let runtime = helpers::runtime();
    runtime
        .cache
        .set("foo", json!({"bar": 123, "blah": "hahaha"}));

    assert_eq!(
        runtime.cache.del("foo.bar"),
        Deletion::Nested(Some(json!({"blah": "hahaha"})))
    );
    assert_eq!(runtime.cache.del("foo"), Deletion::Root(true));
    assert_eq!(runtime.cache.get_or("foo", "gone"), json!("gone"));
}

#[tokio::test(start_paused = true)]
async fn test_merge_import() {
    let runtime = helpers::runtime();
    runtime.cache.set("existing", "keep me");
    let log = EventLog::subscribe(&runtime, "");

    let expired = Arc::new(Mutex::new(Vec::<String>::new()));
    let sink = expired.clone();
    let now = Utc::now();
    let size = runtime.cache.merge(
        vec![
            ("existing".to_string(), MergeEntry::new("overwritten?")),
            (
                "short".to_string(),
                MergeEntry::new(json!({"n": 1}))
                    .expire_at(now + TimeDelta::milliseconds(500))
                    .on_expire(move |key: &ObjectPath, _: &Value| {
                        sink.lock().unwrap().push(key.to_string());
                    }),
            ),
            (
                "stale".to_string(),
                MergeEntry::new(true).expire_at(now - TimeDelta::minutes(5)),
            ),
        ],
        MergeOptions::skip_duplicates(),
    );

    assert_eq!(size, 2);
    assert_eq!(runtime.cache.keys(), vec!["existing", "short"]);
    assert_eq!(runtime.cache.get("existing"), Some(json!("keep me")));
    assert_eq!(log.ops(), vec!["merge"]);

    sleep(Duration::from_secs(1)).await;
    assert_eq!(runtime.cache.size(), 1);
    assert_eq!(*expired.lock().unwrap(), vec!["short".to_string()]);
    assert_eq!(log.ops(), vec!["merge", "expire"]);
}

#[tokio::test(start_paused = true)]
async fn test_memsize_counts_nested_entries() {
    let runtime = helpers::runtime();
    runtime.cache.set("a.b.c", 1);
    runtime.cache.set("d", 2);

    assert_eq!(runtime.cache.size(), 2);
    assert_eq!(runtime.cache.memsize(), 4);
}
