//! Plexus demo. Wires a runtime together and exercises each primitive.
//!
//! Loads configuration, initializes logging, then runs a hook pipeline, a
//! cache entry with expiry, and a bounded pulse task before shutting down.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use anyhow::Context;
use serde_json::{Value, json};
use tokio::sync::Notify;
use tracing_subscriber::{EnvFilter, fmt};

use plexus::Runtime;
use plexus_cache::CacheEvent;
use plexus_core::config::{LogFormat, RuntimeConfig};
use plexus_core::{AppError, ObjectPath, Priority};
use plexus_plugin::{HookContext, HookOptions};
use plexus_worker::Task;

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Demo failed: {e:#}");
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment
fn load_configuration() -> anyhow::Result<RuntimeConfig> {
    let env = std::env::var("PLEXUS_ENV").unwrap_or_else(|_| "development".to_string());
    RuntimeConfig::load(&env).with_context(|| format!("loading configuration for '{env}'"))
}

/// Initialize tracing/logging
fn init_logging(config: &RuntimeConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        LogFormat::Pretty => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: RuntimeConfig) -> anyhow::Result<()> {
    tracing::info!("Starting Plexus demo v{}", env!("CARGO_PKG_VERSION"));
    let runtime = Runtime::new(&config);

    tokio::select! {
        result = demo(&runtime) => result?,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received Ctrl-C, shutting down");
        }
    }

    runtime.shutdown();
    Ok(())
}

async fn demo(runtime: &Runtime) -> anyhow::Result<()> {
    hooks_demo(runtime).await?;
    cache_demo(runtime).await;
    pulse_demo(runtime).await;
    Ok(())
}

async fn hooks_demo(runtime: &Runtime) -> anyhow::Result<()> {
    runtime
        .hooks
        .register(
            "sum",
            |params: Vec<Value>, mut ctx: HookContext| async move {
                let x = params.first().and_then(Value::as_i64).unwrap_or(0);
                let sum = ctx.get_i64("sum").unwrap_or(0) + x;
                ctx.set("sum", sum);
                Ok(ctx)
            },
            HookOptions::new().order(Priority::High),
        )
        .context("registering sum callback")?;

    runtime
        .hooks
        .register_sync(
            "sum",
            |_: &[Value], ctx: &mut HookContext| {
                let sum = ctx.get_i64("sum").unwrap_or(0);
                ctx.set("sum", sum * 2);
                Ok(())
            },
            HookOptions::new().order(Priority::Low),
        )
        .context("registering double callback")?;

    let context = runtime
        .dispatcher
        .run("sum", vec![json!(5)])
        .await
        .context("running sum hook")?;
    tracing::info!(context = %context.into_value(), "Hook pipeline finished");

    for summary in runtime.hooks.list() {
        tracing::info!(hook = %summary.name, callbacks = summary.callbacks.len(), "Hook registered");
    }
    Ok(())
}

async fn cache_demo(runtime: &Runtime) {
    let expired = Arc::new(Notify::new());
    let signal = expired.clone();
    let subscription = runtime.cache.subscribe("session", move |event: &CacheEvent| {
        tracing::info!(op = event.op(), "Cache event");
        if matches!(event, CacheEvent::Expire { .. }) {
            signal.notify_one();
        }
    });

    // Any write under `session` cancels its pending timer.
    runtime.cache.set("session.user", "demo");
    runtime.cache.set_with_callback(
        "session.token",
        "abc123",
        Duration::from_millis(200),
        |key: &ObjectPath, value: &Value| {
            tracing::info!(key = %key, value = %value, "Session token expired");
        },
    );
    tracing::info!(
        size = runtime.cache.size(),
        memsize = runtime.cache.memsize(),
        snapshot = %runtime.cache.snapshot(),
        "Cache populated"
    );

    expired.notified().await;
    tracing::info!(remaining = %runtime.cache.get_or("session", serde_json::Value::Null), "Cache after expiry");
    subscription.unsubscribe();
}

async fn pulse_demo(runtime: &Runtime) {
    let done = Arc::new(Notify::new());
    let signal = done.clone();
    let polls = Arc::new(AtomicI64::new(0));

    let options = runtime
        .pulse
        .options()
        .delay(Duration::from_millis(100))
        .repeat(3)
        .attempts(2);

    runtime.pulse.register(
        "poll",
        move |task: Arc<Task>, params: Vec<Value>| {
            let polls = polls.clone();
            let signal = signal.clone();
            async move {
                let n = polls.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::info!(task_id = %task.id(), run = n, target = ?params.first(), "Polling");
                // Second poll fails and is retried.
                if n == 2 {
                    return Err(AppError::task("inbox unavailable"));
                }
                if task.count() + 1 >= task.repeat() {
                    signal.notify_one();
                }
                Ok(true)
            }
        },
        options,
        vec![json!("inbox")],
    );

    done.notified().await;
    for snapshot in runtime.pulse.list() {
        tracing::info!(task = ?snapshot, "Pulse task");
    }
    runtime.pulse.unregister("poll").await;
}
