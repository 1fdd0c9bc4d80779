//! engine::tasks
//!
//! The task registry: pollable, cancellable execution of blocking engine
//! calls.
//!
//! # Architecture
//!
//! [`TaskRegistry::submit`] records a task as `Queued` and returns a
//! [`TaskHandle`] immediately. A tokio task waits for a worker permit (at
//! most `max_workers` jobs execute at once), marks the task `Running` and
//! runs the job on the blocking pool. Whatever the job returns, success or
//! [`GatewayError`], is stored as the task's terminal state; a panic is
//! stored as a failure too, so no task stays `Running` after its job ends.
//!
//! # Invariants
//!
//! - State transitions are monotonic: `Queued -> Running -> {Completed |
//!   Failed | Cancelled}`, and a terminal state is never left
//! - A stored result is never modified; polling returns identical snapshots
//! - Cancellation is advisory: the job sees its [`CancelToken`] set, and a
//!   result that arrives after cancellation is discarded
//! - Finished tasks are dropped once `retention` has passed since they
//!   finished

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{watch, Semaphore};

use super::error::{GatewayError, ServerStatus};
use crate::core::types::{TaskId, UtcTimestamp};

/// Operation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskKind {
    Clone,
    Fetch,
    Pull,
    Push,
}

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TaskState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }
}

/// Successful result of a job: the response a synchronous call would give.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// HTTP status (200, or 201 for created resources)
    pub code: u16,
    pub body: Value,
    /// `Location` of a created resource
    pub location: Option<String>,
}

impl Outcome {
    pub fn ok(body: Value) -> Self {
        Self {
            code: 200,
            body,
            location: None,
        }
    }

    pub fn created(body: Value, location: String) -> Self {
        Self {
            code: 201,
            body,
            location: Some(location),
        }
    }
}

/// Cooperative cancellation flag handed to a running job.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Raw flag, for transport callbacks that poll it.
    pub fn flag(&self) -> &AtomicBool {
        &self.0
    }
}

/// Point-in-time view of a task, as served to pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct TaskSnapshot {
    pub id: TaskId,
    pub kind: TaskKind,
    pub state: TaskState,
    pub created: UtcTimestamp,
    /// Where this task can be polled
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// `Location` of a resource the task created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ServerStatus>,
}

impl TaskSnapshot {
    /// The stored success, in the shape of a synchronous response.
    pub fn outcome(&self) -> Option<Outcome> {
        match (self.state, &self.result) {
            (TaskState::Completed, Some(body)) => Some(Outcome {
                code: self.http_code.unwrap_or(200),
                body: body.clone(),
                location: self.result_location.clone(),
            }),
            _ => None,
        }
    }
}

/// Location of the task resource for `id`.
pub fn task_location(id: &TaskId) -> String {
    format!("/task/id/{id}")
}

/// Handle returned by [`TaskRegistry::submit`].
#[derive(Debug)]
pub struct TaskHandle {
    id: TaskId,
    updates: watch::Receiver<TaskState>,
}

impl TaskHandle {
    pub fn id(&self) -> &TaskId {
        &self.id
    }
}

struct Entry {
    snapshot: TaskSnapshot,
    cancel: CancelToken,
    updates: watch::Sender<TaskState>,
    finished: Option<Instant>,
}

struct Inner {
    tasks: Mutex<HashMap<TaskId, Entry>>,
    workers: Arc<Semaphore>,
    retention: Duration,
}

/// Registry of submitted tasks. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.lock().len())
            .field("retention", &self.inner.retention)
            .finish()
    }
}

impl TaskRegistry {
    pub fn new(max_workers: usize, retention: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                tasks: Mutex::new(HashMap::new()),
                workers: Arc::new(Semaphore::new(max_workers.max(1))),
                retention,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Entry>> {
        self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner())
    }

    // =========================================================================
    // Submission and execution
    // =========================================================================

    /// Queue `job` and return immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn submit<F>(&self, kind: TaskKind, job: F) -> TaskHandle
    where
        F: FnOnce(&CancelToken) -> Result<Outcome, GatewayError> + Send + 'static,
    {
        self.sweep();

        let id = TaskId::generate();
        let cancel = CancelToken::new();
        let (tx, rx) = watch::channel(TaskState::Queued);
        let snapshot = TaskSnapshot {
            id: id.clone(),
            kind,
            state: TaskState::Queued,
            created: UtcTimestamp::now(),
            location: task_location(&id),
            http_code: None,
            result: None,
            result_location: None,
            error: None,
        };
        self.lock().insert(
            id.clone(),
            Entry {
                snapshot,
                cancel: cancel.clone(),
                updates: tx,
                finished: None,
            },
        );
        tracing::info!(task = %id, kind = ?kind, "task submitted");

        let registry = self.clone();
        let task_id = id.clone();
        tokio::spawn(async move {
            let permit = match registry.inner.workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    registry.finish(&task_id, Err(GatewayError::Engine("worker pool closed".into())));
                    return;
                }
            };
            if !registry.start(&task_id) {
                return;
            }

            let result = tokio::task::spawn_blocking(move || job(&cancel)).await;
            drop(permit);
            let result = result
                .unwrap_or_else(|e| Err(GatewayError::Engine(format!("task aborted: {e}"))));
            registry.finish(&task_id, result);
        });

        TaskHandle { id, updates: rx }
    }

    /// Queued -> Running. False when the task was cancelled (or dropped)
    /// while waiting for a worker.
    fn start(&self, id: &TaskId) -> bool {
        let mut tasks = self.lock();
        let Some(entry) = tasks.get_mut(id) else {
            return false;
        };
        if entry.snapshot.state != TaskState::Queued {
            return false;
        }
        entry.snapshot.state = TaskState::Running;
        entry.updates.send_replace(TaskState::Running);
        tracing::debug!(task = %id, "task running");
        true
    }

    fn finish(&self, id: &TaskId, result: Result<Outcome, GatewayError>) {
        let mut tasks = self.lock();
        let Some(entry) = tasks.get_mut(id) else {
            return;
        };
        if entry.snapshot.state.is_terminal() {
            tracing::debug!(task = %id, state = ?entry.snapshot.state, "discarding late task result");
            return;
        }

        let snapshot = &mut entry.snapshot;
        match result {
            Ok(outcome) => {
                snapshot.state = TaskState::Completed;
                snapshot.http_code = Some(outcome.code);
                snapshot.result = Some(outcome.body);
                snapshot.result_location = outcome.location;
                tracing::info!(task = %id, code = outcome.code, "task completed");
            }
            Err(err) => {
                snapshot.state = TaskState::Failed;
                snapshot.http_code = Some(err.http_code());
                snapshot.error = Some(err.to_status());
                tracing::warn!(task = %id, error = %err, "task failed");
            }
        }
        entry.finished = Some(Instant::now());
        entry.updates.send_replace(snapshot.state);
    }

    // =========================================================================
    // Observation
    // =========================================================================

    /// Current snapshot of a task. Never blocks on the task itself.
    pub fn poll(&self, id: &TaskId) -> Option<TaskSnapshot> {
        self.lock().get(id).map(|e| e.snapshot.clone())
    }

    /// Wait up to `timeout` for the task to finish, then return its
    /// snapshot (terminal or not).
    pub async fn wait(&self, handle: TaskHandle, timeout: Duration) -> Option<TaskSnapshot> {
        let TaskHandle { id, mut updates } = handle;
        let finished = tokio::time::timeout(timeout, updates.wait_for(TaskState::is_terminal))
            .await
            .is_ok();
        if !finished {
            tracing::debug!(task = %id, "task still running after wait");
        }
        self.poll(&id)
    }

    /// Request cancellation.
    ///
    /// Returns `None` for an unknown task, `Some(false)` when the task had
    /// already finished, `Some(true)` when it was cancelled by this call.
    pub fn cancel(&self, id: &TaskId) -> Option<bool> {
        let mut tasks = self.lock();
        let entry = tasks.get_mut(id)?;
        if entry.snapshot.state.is_terminal() {
            return Some(false);
        }
        entry.cancel.cancel();
        entry.snapshot.state = TaskState::Cancelled;
        entry.finished = Some(Instant::now());
        entry.updates.send_replace(TaskState::Cancelled);
        tracing::info!(task = %id, "task cancelled");
        Some(true)
    }

    /// Drop finished tasks older than the retention period.
    pub fn sweep(&self) -> usize {
        let retention = self.inner.retention;
        let mut tasks = self.lock();
        let before = tasks.len();
        tasks.retain(|_, e| e.finished.map_or(true, |at| at.elapsed() < retention));
        let removed = before - tasks.len();
        if removed > 0 {
            tracing::debug!(removed, "swept finished tasks");
        }
        removed
    }

    /// Number of tasks currently held.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
