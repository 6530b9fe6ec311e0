//! Registry of pipeline runs started through the API.
//!
//! Each run executes on a background task tracked by the registry so the
//! server can cancel and drain them on shutdown. Handlers only ever read
//! the live scene list; the pipeline task is its sole writer.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use atelier_core::error::CoreError;
use atelier_core::scene::Scene;
use atelier_core::types::{RunId, Timestamp};
use atelier_pipeline::RunOutcome;
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Which flow produced the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunKind {
    Batch,
    Story,
    Ad,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Completed,
    Cancelled,
    Aborted,
    /// The run could not start, e.g. the story script was unusable.
    Failed,
}

impl RunState {
    pub fn is_terminal(self) -> bool {
        self != RunState::Running
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RunState::Running => "running",
            RunState::Completed => "completed",
            RunState::Cancelled => "cancelled",
            RunState::Aborted => "aborted",
            RunState::Failed => "failed",
        }
    }
}

impl From<RunOutcome> for RunState {
    fn from(outcome: RunOutcome) -> Self {
        match outcome {
            RunOutcome::Completed => RunState::Completed,
            RunOutcome::Cancelled => RunState::Cancelled,
            RunOutcome::Aborted => RunState::Aborted,
        }
    }
}

#[derive(Debug)]
struct RunStatus {
    state: RunState,
    title: Option<String>,
    error: Option<String>,
    finished_at: Option<Timestamp>,
}

/// One registered run.
pub struct RunHandle {
    pub id: RunId,
    pub kind: RunKind,
    pub created_at: Timestamp,
    scenes: Arc<RwLock<Vec<Scene>>>,
    cancel: CancellationToken,
    status: RwLock<RunStatus>,
}

impl RunHandle {
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn scenes(&self) -> Arc<RwLock<Vec<Scene>>> {
        Arc::clone(&self.scenes)
    }

    pub async fn state(&self) -> RunState {
        self.status.read().await.state
    }

    pub async fn set_title(&self, title: impl Into<String>) {
        self.status.write().await.title = Some(title.into());
    }

    /// Record the pipeline's outcome.
    pub async fn finish(&self, state: RunState) {
        let mut status = self.status.write().await;
        status.state = state;
        status.finished_at = Some(chrono::Utc::now());
        tracing::info!(run_id = %self.id, state = ?state, "Run finished");
    }

    /// Record a failure that prevented the run from processing scenes.
    pub async fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!(run_id = %self.id, error = %message, "Run failed");
        let mut status = self.status.write().await;
        status.state = RunState::Failed;
        status.error = Some(message);
        status.finished_at = Some(chrono::Utc::now());
    }

    pub async fn view(&self) -> RunView {
        let status = self.status.read().await;
        RunView {
            id: self.id,
            kind: self.kind,
            state: status.state,
            title: status.title.clone(),
            error: status.error.clone(),
            created_at: self.created_at,
            finished_at: status.finished_at,
            scenes: self.scenes.read().await.clone(),
        }
    }
}

impl fmt::Debug for RunHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("created_at", &self.created_at)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

/// Serializable snapshot of a run.
#[derive(Debug, Clone, Serialize)]
pub struct RunView {
    pub id: RunId,
    pub kind: RunKind,
    pub state: RunState,
    pub title: Option<String>,
    pub error: Option<String>,
    pub created_at: Timestamp,
    pub finished_at: Option<Timestamp>,
    pub scenes: Vec<Scene>,
}

/// Finished runs kept for polling by default.
pub const DEFAULT_RETAINED_RUNS: usize = 100;

/// All runs known to this server process.
///
/// Running runs are always kept. Finished runs beyond `retained` are
/// evicted oldest-finished first whenever a new run is registered.
pub struct RunRegistry {
    runs: RwLock<HashMap<RunId, Arc<RunHandle>>>,
    tasks: TaskTracker,
    retained: usize,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::with_retention(DEFAULT_RETAINED_RUNS)
    }

    /// Keep at most `retained` finished runs.
    pub fn with_retention(retained: usize) -> Self {
        Self {
            runs: RwLock::new(HashMap::new()),
            tasks: TaskTracker::new(),
            retained,
        }
    }

    /// Register a run over `scenes` in the `running` state.
    pub async fn register(
        &self,
        id: RunId,
        kind: RunKind,
        scenes: Arc<RwLock<Vec<Scene>>>,
    ) -> Arc<RunHandle> {
        let handle = Arc::new(RunHandle {
            id,
            kind,
            created_at: chrono::Utc::now(),
            scenes,
            cancel: CancellationToken::new(),
            status: RwLock::new(RunStatus {
                state: RunState::Running,
                title: None,
                error: None,
                finished_at: None,
            }),
        });
        let evicted = self.evict_finished().await;
        self.runs.write().await.insert(id, Arc::clone(&handle));
        tracing::debug!(run_id = %id, kind = ?kind, evicted, "Run registered");
        handle
    }

    /// Drop the oldest finished runs beyond the retention limit. Returns
    /// how many were removed.
    pub async fn evict_finished(&self) -> usize {
        let mut runs = self.runs.write().await;
        let mut finished = Vec::new();
        for (id, handle) in runs.iter() {
            let status = handle.status.read().await;
            if let (true, Some(at)) = (status.state.is_terminal(), status.finished_at) {
                finished.push((at, *id));
            }
        }
        if finished.len() <= self.retained {
            return 0;
        }

        finished.sort_by(|a, b| b.0.cmp(&a.0));
        let stale: Vec<RunId> = finished.split_off(self.retained).into_iter().map(|(_, id)| id).collect();
        for id in &stale {
            runs.remove(id);
        }
        tracing::debug!(evicted = stale.len(), "Finished runs evicted");
        stale.len()
    }

    /// Run `task` in the background, tracked for shutdown draining.
    pub fn spawn<F>(&self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(task);
    }

    pub async fn get(&self, id: RunId) -> Result<Arc<RunHandle>, CoreError> {
        self.runs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound {
                entity: "Run",
                id: id.to_string(),
            })
    }

    /// Every run, newest first.
    pub async fn list(&self) -> Vec<RunView> {
        let handles: Vec<_> = self.runs.read().await.values().cloned().collect();
        let mut views = Vec::with_capacity(handles.len());
        for handle in handles {
            views.push(handle.view().await);
        }
        views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        views
    }

    /// Request cancellation. The scene in flight finishes first.
    pub async fn cancel(&self, id: RunId) -> Result<(), CoreError> {
        let handle = self.get(id).await?;
        let state = handle.state().await;
        if state.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "run {id} has already finished ({})",
                state.as_str()
            )));
        }
        handle.cancel.cancel();
        tracing::info!(run_id = %id, "Run cancellation requested");
        Ok(())
    }

    /// Cancel every running run and wait up to `timeout` for their tasks.
    ///
    /// Returns `false` if tasks were still running when the wait ended.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        for handle in self.runs.read().await.values() {
            handle.cancel.cancel();
        }
        self.tasks.close();
        tokio::time::timeout(timeout, self.tasks.wait()).await.is_ok()
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}
