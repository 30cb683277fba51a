//! Pulse, the task table.

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tracing::{debug, info, warn};

use plexus_core::config::PulseConfig;
use plexus_core::error::AppError;
use plexus_core::result::AppResult;

use crate::task::{Task, TaskCallback, TaskFuture, TaskOptions, TaskSnapshot};

/// Scheduler owning every registered [`Task`], keyed by task id.
#[derive(Debug)]
pub struct Pulse {
    /// Task id → task.
    tasks: Arc<DashMap<String, Arc<Task>>>,
    /// Options used by [`Pulse::options`].
    defaults: TaskOptions,
}

impl Pulse {
    /// Creates an empty scheduler.
    pub fn new(config: &PulseConfig) -> Self {
        Self {
            tasks: Arc::new(DashMap::new()),
            defaults: TaskOptions::from(config),
        }
    }

    /// The configured default task options, ready to be adjusted.
    pub fn options(&self) -> TaskOptions {
        self.defaults
    }

    /// Registers a task and starts it when `options.autostart` is set.
    ///
    /// The callback receives the task itself and `params` on every run and
    /// resolves to `Ok(true)` on success. An existing task with the same id
    /// is stopped and replaced; its in-flight callback, if any, still
    /// finishes but the old task never runs again.
    pub fn register<F, Fut>(
        &self,
        id: &str,
        callback: F,
        options: TaskOptions,
        params: Vec<Value>,
    ) -> Arc<Task>
    where
        F: Fn(Arc<Task>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = AppResult<bool>> + Send + 'static,
    {
        let callback: TaskCallback =
            Arc::new(move |task: Arc<Task>, params: Vec<Value>| -> TaskFuture {
                Box::pin(callback(task, params))
            });
        let task = Task::new(id, callback, &options, params);

        if let Some(previous) = self.tasks.insert(id.to_string(), task.clone()) {
            previous.retire();
            warn!(task_id = %id, "Replaced existing task");
        }

        info!(
            task_id = %id,
            attempts = options.attempts,
            repeat = options.repeat,
            delay_ms = options.delay.as_millis() as u64,
            autostart = options.autostart,
            "Task registered"
        );

        if options.autostart {
            task.start();
        }
        task
    }

    /// Returns the task registered under `id`.
    pub fn get(&self, id: &str) -> Option<Arc<Task>> {
        self.tasks.get(id).map(|entry| entry.value().clone())
    }

    /// Starts the task registered under `id`.
    pub fn start(&self, id: &str) -> AppResult<()> {
        self.require(id)?.start();
        Ok(())
    }

    /// Stops the task registered under `id`.
    pub fn stop(&self, id: &str) -> AppResult<()> {
        self.require(id)?.stop();
        Ok(())
    }

    /// Starts every task.
    pub fn start_all(&self) {
        for task in self.all() {
            task.start();
        }
        info!(count = self.tasks.len(), "All tasks started");
    }

    /// Stops every task.
    pub fn stop_all(&self) {
        for task in self.all() {
            task.stop();
        }
        info!(count = self.tasks.len(), "All tasks stopped");
    }

    /// Stops and removes the task registered under `id`. Returns whether a
    /// task was registered.
    ///
    /// A task with a callback in flight is only removed once that callback
    /// settles. Callers wait for it, except the callback itself, which would
    /// otherwise wait on its own completion.
    pub async fn unregister(&self, id: &str) -> bool {
        let Some(task) = self.get(id) else {
            return false;
        };

        let table = Arc::downgrade(&self.tasks);
        let target = Arc::downgrade(&task);
        let key = id.to_string();
        let deferred = task.retire_then(Box::new(move || {
            let (Some(table), Some(target)) = (table.upgrade(), target.upgrade()) else {
                return;
            };
            // A replacement registered in the meantime stays in place.
            if table
                .remove_if(&key, |_, current| Arc::ptr_eq(current, &target))
                .is_some()
            {
                info!(task_id = %key, "Task unregistered");
            }
        }));

        if deferred {
            if task.in_own_callback() {
                debug!(task_id = %id, "Task unregistered from its own callback; removal deferred");
            } else {
                task.settled().await;
            }
        }
        true
    }

    /// Registered task ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tasks.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    /// Snapshots of every task, sorted by id.
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let mut snapshots: Vec<TaskSnapshot> = self.all().iter().map(|task| task.snapshot()).collect();
        snapshots.sort_by(|a, b| a.id.cmp(&b.id));
        snapshots
    }

    /// Number of registered tasks.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Whether no tasks are registered.
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    fn all(&self) -> Vec<Arc<Task>> {
        self.tasks.iter().map(|entry| entry.value().clone()).collect()
    }

    fn require(&self, id: &str) -> AppResult<Arc<Task>> {
        self.get(id).ok_or_else(|| {
            warn!(task_id = %id, "Task not found");
            AppError::not_found(format!("Task '{id}' not found"))
        })
    }
}

impl Default for Pulse {
    fn default() -> Self {
        Self::new(&PulseConfig::default())
    }
}
