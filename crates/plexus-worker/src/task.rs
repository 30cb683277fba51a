//! Pulse task: one retryable, repeatable unit of scheduled work.
//!
//! A task runs its callback after `delay`, then decides whether to run
//! again from the outcome:
//!
//! - failure (`Ok(false)`, `Err`, or a panic): `attempt += 1`; the task is
//!   *failed* once `attempts > -1 && attempt >= attempts`
//! - success: `attempt = 0`, `count += 1`; the task is *complete* once
//!   `repeat > -1 && count >= repeat`
//!
//! A task that is neither failed nor complete re-arms itself while its status
//! is [`TaskStatus::Running`].

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use plexus_core::config::PulseConfig;
use plexus_core::result::AppResult;

/// Boxed future returned by a task callback.
pub type TaskFuture = Pin<Box<dyn Future<Output = AppResult<bool>> + Send>>;

pub(crate) type TaskCallback = Arc<dyn Fn(Arc<Task>, Vec<Value>) -> TaskFuture + Send + Sync>;

/// Runs once the in-flight callback of a retired task has settled.
pub(crate) type SettleHook = Box<dyn FnOnce() + Send>;

static NEXT_SERIAL: AtomicU64 = AtomicU64::new(0);

tokio::task_local! {
    /// Serial of the task whose callback is being polled.
    static CURRENT_TASK: u64;
}

/// Whether a task re-arms itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    /// Runs are armed after each settled callback.
    Running,
    /// No further runs are armed.
    Stopped,
}

/// Options for [`Pulse::register`](crate::Pulse::register).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOptions {
    /// Failed attempts allowed before the task fails. `-1` retries forever.
    pub attempts: i64,
    /// Wait before each run.
    pub delay: Duration,
    /// Successful runs before the task completes. `-1` never completes.
    pub repeat: i64,
    /// Start as soon as the task is registered.
    pub autostart: bool,
}

impl TaskOptions {
    /// Sets the attempt limit.
    pub fn attempts(mut self, attempts: i64) -> Self {
        self.attempts = attempts;
        self
    }

    /// Sets the delay between runs.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Sets the repeat limit.
    pub fn repeat(mut self, repeat: i64) -> Self {
        self.repeat = repeat;
        self
    }

    /// Sets whether the task starts on registration.
    pub fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }
}

impl From<&PulseConfig> for TaskOptions {
    fn from(config: &PulseConfig) -> Self {
        Self {
            attempts: config.attempts,
            delay: Duration::from_millis(config.delay_ms),
            repeat: config.repeat,
            autostart: config.autostart,
        }
    }
}

impl Default for TaskOptions {
    fn default() -> Self {
        Self::from(&PulseConfig::default())
    }
}

/// Point-in-time view of a task, for logging and listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task id.
    pub id: String,
    /// Current status.
    pub status: TaskStatus,
    /// Consecutive failed attempts.
    pub attempt: i64,
    /// Successful runs.
    pub count: i64,
    /// Attempt limit.
    pub attempts: i64,
    /// Repeat limit.
    pub repeat: i64,
    /// Delay between runs in milliseconds.
    pub delay_ms: u64,
    /// Whether the repeat limit was reached.
    pub complete: bool,
    /// Whether the attempt limit was reached.
    pub failed: bool,
    /// Last failure message.
    pub error: Option<String>,
}

struct TaskState {
    attempts: i64,
    delay: Duration,
    repeat: i64,
    autostart: bool,
    attempt: i64,
    count: i64,
    status: TaskStatus,
    error: Option<String>,
    in_flight: bool,
    retry_requested: bool,
    retired: bool,
    generation: u64,
    pending: Option<u64>,
    timer: Option<JoinHandle<()>>,
    on_settled: Option<SettleHook>,
}

impl TaskState {
    fn new(options: &TaskOptions) -> Self {
        Self {
            attempts: options.attempts,
            delay: options.delay,
            repeat: options.repeat,
            autostart: options.autostart,
            attempt: 0,
            count: 0,
            status: TaskStatus::Stopped,
            error: None,
            in_flight: false,
            retry_requested: false,
            retired: false,
            generation: 0,
            pending: None,
            timer: None,
            on_settled: None,
        }
    }

    fn complete(&self) -> bool {
        self.repeat > -1 && self.count >= self.repeat
    }

    fn failed(&self) -> bool {
        self.attempts > -1 && self.attempt >= self.attempts
    }

    fn halted(&self) -> bool {
        self.complete() || self.failed()
    }

    fn cancel_timer(&mut self) {
        self.pending = None;
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// One scheduled unit of work. Shared as `Arc<Task>`; the callback receives
/// its own task so it can inspect progress or request a retry.
pub struct Task {
    id: String,
    serial: u64,
    callback: TaskCallback,
    params: Vec<Value>,
    state: Mutex<TaskState>,
    settled: Notify,
    me: Weak<Task>,
}

impl Task {
    pub(crate) fn new(
        id: &str,
        callback: TaskCallback,
        options: &TaskOptions,
        params: Vec<Value>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            id: id.to_string(),
            serial: NEXT_SERIAL.fetch_add(1, Ordering::Relaxed),
            callback,
            params,
            state: Mutex::new(TaskState::new(options)),
            settled: Notify::new(),
            me: me.clone(),
        })
    }

    fn lock(&self) -> MutexGuard<'_, TaskState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Task id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current status.
    pub fn status(&self) -> TaskStatus {
        self.lock().status
    }

    /// Consecutive failed attempts since the last success.
    pub fn attempt(&self) -> i64 {
        self.lock().attempt
    }

    /// Successful runs.
    pub fn count(&self) -> i64 {
        self.lock().count
    }

    /// Whether the repeat limit has been reached.
    pub fn complete(&self) -> bool {
        self.lock().complete()
    }

    /// Whether the attempt limit has been reached.
    pub fn failed(&self) -> bool {
        self.lock().failed()
    }

    /// Message of the last failed attempt.
    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    /// Identifier of the pending timer, if a run is armed.
    pub fn timer(&self) -> Option<u64> {
        self.lock().pending
    }

    /// Whether the callback is executing right now.
    pub fn is_running(&self) -> bool {
        self.lock().in_flight
    }

    /// `count / repeat` in `0.0..=1.0`. `None` unless `repeat > 0`.
    pub fn progress(&self) -> Option<f64> {
        let state = self.lock();
        (state.repeat > 0).then(|| (state.count as f64 / state.repeat as f64).min(1.0))
    }

    /// Attempt limit.
    pub fn attempts(&self) -> i64 {
        self.lock().attempts
    }

    /// Delay between runs.
    pub fn delay(&self) -> Duration {
        self.lock().delay
    }

    /// Repeat limit.
    pub fn repeat(&self) -> i64 {
        self.lock().repeat
    }

    /// Whether the task started on registration.
    pub fn autostart(&self) -> bool {
        self.lock().autostart
    }

    /// Changes the attempt limit. Takes effect after the next settled run.
    pub fn set_attempts(&self, attempts: i64) {
        self.lock().attempts = attempts;
    }

    /// Changes the delay. Takes effect when the next run is armed.
    pub fn set_delay(&self, delay: Duration) {
        self.lock().delay = delay;
    }

    /// Changes the repeat limit. Takes effect after the next settled run.
    pub fn set_repeat(&self, repeat: i64) {
        self.lock().repeat = repeat;
    }

    /// Returns a point-in-time view of the task.
    pub fn snapshot(&self) -> TaskSnapshot {
        let state = self.lock();
        TaskSnapshot {
            id: self.id.clone(),
            status: state.status,
            attempt: state.attempt,
            count: state.count,
            attempts: state.attempts,
            repeat: state.repeat,
            delay_ms: state.delay.as_millis() as u64,
            complete: state.complete(),
            failed: state.failed(),
            error: state.error.clone(),
        }
    }

    /// Marks the task running and arms the next run unless one is already
    /// armed or in flight. Counters are kept.
    pub fn start(&self) {
        let mut state = self.lock();
        if state.retired {
            warn!(task_id = %self.id, "Ignoring start of an unregistered task");
            return;
        }
        state.status = TaskStatus::Running;
        if !state.in_flight && state.pending.is_none() && !state.halted() {
            let delay = state.delay;
            self.arm(&mut state, delay);
        }
        debug!(task_id = %self.id, "Task started");
    }

    /// Marks the task stopped and cancels the pending run. A callback already
    /// in flight finishes normally.
    pub fn stop(&self) {
        let mut state = self.lock();
        state.status = TaskStatus::Stopped;
        state.cancel_timer();
        debug!(task_id = %self.id, "Task stopped");
    }

    /// Runs the callback immediately, skipping the pending delay.
    ///
    /// Does nothing if the callback is already in flight. Resolves once the
    /// forced run has settled. The run itself is spawned, so dropping this
    /// future does not cancel it.
    pub async fn now(&self) {
        let Some(task) = self.me.upgrade() else {
            return;
        };
        {
            let mut state = self.lock();
            if state.in_flight || state.retired {
                return;
            }
            state.cancel_timer();
        }

        match Handle::try_current() {
            Ok(runtime) => {
                if let Err(e) = runtime.spawn(task.run_once()).await {
                    warn!(task_id = %self.id, error = %e, "Forced task run did not finish");
                }
            }
            Err(_) => task.run_once().await,
        }
    }

    /// Forces a retry cycle.
    ///
    /// Called from inside the callback, the current run counts as a failed
    /// attempt whatever the callback returns. Called while idle, it counts one
    /// failed attempt and re-arms the task after `delay` unless that attempt
    /// made it fail.
    pub fn retry(&self) {
        let mut state = self.lock();
        if state.in_flight {
            state.retry_requested = true;
            return;
        }

        state.attempt += 1;
        state.cancel_timer();
        if state.failed() {
            warn!(task_id = %self.id, attempt = state.attempt, "Task failed after retry");
        } else if state.status == TaskStatus::Running && !state.retired {
            let delay = state.delay;
            self.arm(&mut state, delay);
        }
        debug!(task_id = %self.id, attempt = state.attempt, "Task retry requested");
    }

    /// Zeroes `attempt` and `count` and clears the last error, which clears
    /// the failed and complete states. A running idle task is re-armed.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.attempt = 0;
        state.count = 0;
        state.error = None;
        if state.status == TaskStatus::Running
            && !state.retired
            && !state.in_flight
            && state.pending.is_none()
        {
            let delay = state.delay;
            self.arm(&mut state, delay);
        }
        debug!(task_id = %self.id, "Task reset");
    }

    /// Stops the task for good. An in-flight callback finishes but the task
    /// is never armed again.
    pub(crate) fn retire(&self) {
        let mut state = self.lock();
        state.retired = true;
        state.status = TaskStatus::Stopped;
        state.cancel_timer();
    }

    /// Retires the task and hands `hook` the cleanup.
    ///
    /// With no callback in flight the hook runs now and `false` is returned.
    /// Otherwise it runs as soon as the callback settles and `true` is
    /// returned.
    pub(crate) fn retire_then(&self, hook: SettleHook) -> bool {
        let mut state = self.lock();
        state.retired = true;
        state.status = TaskStatus::Stopped;
        state.cancel_timer();
        if state.in_flight {
            state.on_settled = Some(hook);
            return true;
        }
        drop(state);
        hook();
        false
    }

    /// Whether the caller is running inside this task's own callback.
    pub(crate) fn in_own_callback(&self) -> bool {
        CURRENT_TASK
            .try_with(|serial| *serial == self.serial)
            .unwrap_or(false)
    }

    /// Resolves once no callback is in flight.
    pub(crate) async fn settled(&self) {
        loop {
            let settled = self.settled.notified();
            if !self.lock().in_flight {
                return;
            }
            debug!(task_id = %self.id, "Waiting for in-flight task callback");
            settled.await;
        }
    }

    fn arm(&self, state: &mut TaskState, delay: Duration) {
        state.cancel_timer();
        state.generation += 1;
        let generation = state.generation;

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(_) => {
                warn!(task_id = %self.id, "No tokio runtime available; task not scheduled");
                return;
            }
        };

        let task = self.me.clone();
        state.pending = Some(generation);
        state.timer = Some(runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(task) = task.upgrade() {
                task.fire(generation).await;
            }
        }));
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        {
            let mut state = self.lock();
            if state.pending != Some(generation) {
                return;
            }
            // Claim the timer so stop() can no longer abort this run.
            state.pending = None;
            state.timer = None;
            if state.status != TaskStatus::Running {
                return;
            }
        }
        self.run_once().await;
    }

    async fn run_once(self: Arc<Self>) {
        {
            let mut state = self.lock();
            if state.in_flight {
                return;
            }
            state.in_flight = true;
            state.retry_requested = false;
        }

        debug!(task_id = %self.id, "Running task callback");
        let task = self.clone();
        let params = self.params.clone();
        let callback = self.callback.clone();
        let outcome = AssertUnwindSafe(CURRENT_TASK.scope(self.serial, callback(task, params)))
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(true)) => None,
            Ok(Ok(false)) => Some("Task callback reported failure".to_string()),
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(panic_message(panic.as_ref())),
        };

        let on_settled = {
            let mut state = self.lock();
            state.in_flight = false;
            let failure = match failure {
                Some(message) => Some(message),
                None if state.retry_requested => Some("Retry requested".to_string()),
                None => None,
            };
            state.retry_requested = false;

            match failure {
                Some(message) => {
                    state.attempt += 1;
                    warn!(
                        task_id = %self.id,
                        attempt = state.attempt,
                        attempts = state.attempts,
                        error = %message,
                        "Task attempt failed"
                    );
                    state.error = Some(message);
                }
                None => {
                    state.attempt = 0;
                    state.count += 1;
                    debug!(task_id = %self.id, count = state.count, "Task run succeeded");
                }
            }

            if state.failed() {
                warn!(task_id = %self.id, attempt = state.attempt, "Task failed");
            } else if state.complete() {
                info!(task_id = %self.id, count = state.count, "Task complete");
            } else if state.status == TaskStatus::Running && !state.retired {
                let delay = state.delay;
                self.arm(&mut state, delay);
            }
            state.on_settled.take()
        };

        if let Some(hook) = on_settled {
            hook();
        }
        self.settled.notify_waiters();
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("status", &state.status)
            .field("attempt", &state.attempt)
            .field("count", &state.count)
            .field("in_flight", &state.in_flight)
            .finish()
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("Task callback panicked: {message}")
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("Task callback panicked: {message}")
    } else {
        "Task callback panicked".to_string()
    }
}
