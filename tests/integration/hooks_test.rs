//! Integration tests for registries and hook pipelines.

mod helpers;

use std::sync::Arc;

use serde_json::{Value, json};

use plexus_core::error::ErrorKind;
use plexus_plugin::HookSummary;
use plexus_plugin::prelude::*;

#[tokio::test]
async fn test_sequential_mutation() {
    let runtime = helpers::runtime();
    runtime
        .hooks
        .register(
            "h",
            |params, mut ctx| async move {
                let x = params[0].as_i64().unwrap_or(0);
                let sum = ctx.get_i64("sum").unwrap_or(0) + x;
                ctx.set("sum", sum);
                Ok(ctx)
            },
            HookOptions::new().order(1),
        )
        .unwrap();
    runtime
        .hooks
        .register(
            "h",
            |_, mut ctx| async move {
                let sum = ctx.get_i64("sum").unwrap_or(0);
                ctx.set("sum", sum * 2);
                Ok(ctx)
            },
            HookOptions::new().order(2),
        )
        .unwrap();

    let ctx = runtime.dispatcher.run("h", vec![json!(5)]).await.unwrap();
    assert_eq!(ctx.into_value(), json!({"sum": 10}));
}

struct ComponentPlugin {
    name: &'static str,
}

#[async_trait]
impl HookHandler for ComponentPlugin {
    async fn handle(&self, _: &[Value], ctx: &mut HookContext) -> AppResult<()> {
        if !ctx.contains("component") {
            ctx.set("component", self.name);
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_earlier_plugin_wins_component_slot() {
    let runtime = helpers::runtime();
    runtime
        .hooks
        .register_handler(
            "component",
            Arc::new(ComponentPlugin { name: "Late" }),
            HookOptions::new().order(Priority::Lowest),
        )
        .unwrap();
    runtime
        .hooks
        .register_handler(
            "component",
            Arc::new(ComponentPlugin { name: "Early" }),
            HookOptions::new().order(Priority::Highest),
        )
        .unwrap();

    let ctx = runtime.dispatcher.run("component", vec![]).await.unwrap();
    assert_eq!(ctx.get_str("component"), Some("Early"));
}

#[tokio::test]
async fn test_failing_plugin_halts_pipeline() {
    let runtime = helpers::runtime();
    runtime
        .hooks
        .register(
            "h",
            |_, _| async { Err(AppError::validation("bad input")) },
            HookOptions::new().id("validator").order(Priority::High),
        )
        .unwrap();
    runtime
        .hooks
        .register_sync(
            "h",
            |_: &[Value], ctx: &mut HookContext| {
                ctx.set("reached", true);
                Ok(())
            },
            HookOptions::new(),
        )
        .unwrap();

    let err = runtime.dispatcher.run("h", vec![]).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Plugin);
    assert!(err.message.contains("validator"));
    assert!(err.message.contains("bad input"));
}

#[tokio::test]
async fn test_run_sync_ignores_async_callbacks() {
    let runtime = helpers::runtime();
    runtime
        .hooks
        .register(
            "h",
            |_, mut ctx| async move {
                ctx.set("async", true);
                Ok(ctx)
            },
            HookOptions::new(),
        )
        .unwrap();
    runtime
        .hooks
        .register_sync(
            "h",
            |params: &[Value], ctx: &mut HookContext| {
                ctx.set("first", params[0].clone());
                Ok(())
            },
            HookOptions::new(),
        )
        .unwrap();

    let ctx = runtime.dispatcher.run_sync("h", vec![json!("x")]).unwrap();
    assert_eq!(ctx.into_value(), json!({"first": "x"}));
}

#[tokio::test]
async fn test_flush_and_reregister() {
    let runtime = helpers::runtime();
    let noop = |_: &[Value], _: &mut HookContext| Ok(());
    runtime.hooks.register_sync("init", noop, HookOptions::new()).unwrap();
    runtime.hooks.register_sync("init", noop, HookOptions::new()).unwrap();

    runtime.hooks.flush("init");
    assert!(!runtime.hooks.has_callbacks("init"));
    assert!(runtime.dispatcher.run("init", vec![]).await.unwrap().is_empty());

    runtime
        .hooks
        .register_sync(
            "init",
            |_: &[Value], ctx: &mut HookContext| {
                ctx.set("again", true);
                Ok(())
            },
            HookOptions::new(),
        )
        .unwrap();
    let ctx = runtime.dispatcher.run("init", vec![]).await.unwrap();
    assert_eq!(ctx.get_bool("again"), Some(true));
}

#[tokio::test]
async fn test_list_reports_effective_callbacks() {
    let runtime = helpers::runtime();
    runtime
        .hooks
        .register_sync(
            "b",
            |_: &[Value], _: &mut HookContext| Ok(()),
            HookOptions::new().id("sync-cb").order(Priority::Low),
        )
        .unwrap();
    let gone = runtime
        .hooks
        .register("a", |_, ctx| async move { Ok(ctx) }, HookOptions::new())
        .unwrap();
    runtime
        .hooks
        .register(
            "a",
            |_, ctx| async move { Ok(ctx) },
            HookOptions::new().id("async-cb"),
        )
        .unwrap();
    runtime.hooks.unregister(&gone);

    let list: Vec<HookSummary> = runtime.hooks.list();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].name, "a");
    assert_eq!(list[0].callbacks.len(), 1);
    assert_eq!(list[0].callbacks[0].id, "async-cb");
    assert_eq!(list[0].callbacks[0].mode, HookMode::Async);
    assert_eq!(
        serde_json::to_value(&list[1]).unwrap(),
        json!({
            "name": "b",
            "callbacks": [{"id": "sync-cb", "order": 500, "mode": "sync"}]
        })
    );
}

#[test]
fn test_registry_for_component_substitution() {
    let mut components: Registry<&str> = Registry::new("Components");
    components
        .register_with_order(Some("header"), 0, "DefaultHeader")
        .unwrap()
        .register_with_order(Some("footer"), 10, "DefaultFooter")
        .unwrap()
        .protect("footer");

    components.register(Some("header"), "PluginHeader").unwrap();
    let err = components.register(Some("footer"), "PluginFooter").unwrap_err();
    assert_eq!(err.to_string(), "Components unable to replace protected item footer");

    let app_err: AppError = err.into();
    assert_eq!(app_err.kind, ErrorKind::Conflict);

    let payloads: Vec<&str> = components.list().iter().map(|item| item.data).collect();
    assert_eq!(payloads, vec!["DefaultFooter", "PluginHeader"]);
}
