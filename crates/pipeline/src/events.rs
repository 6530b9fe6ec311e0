//! In-process pipeline progress events backed by a `tokio::sync::broadcast`
//! channel.
//!
//! [`EventBus`] is shared via `Arc<EventBus>` between the pipelines that
//! publish and the API/CLI code that renders progress.

use atelier_core::scene::SceneStatus;
use atelier_core::types::{RunId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// PipelineEvent
// ---------------------------------------------------------------------------

pub const RUN_STARTED: &str = "run.started";
pub const SCENE_STATUS: &str = "scene.status";
pub const RUN_FINISHED: &str = "run.finished";

/// Something that happened during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineEvent {
    /// Dot-separated event name, e.g. `"scene.status"`.
    pub event_type: String,

    pub run_id: RunId,

    /// Scene the event refers to, if any.
    pub scene_index: Option<usize>,

    /// New scene status for `scene.status` events.
    pub status: Option<SceneStatus>,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: Timestamp,
}

impl PipelineEvent {
    pub fn new(event_type: impl Into<String>, run_id: RunId) -> Self {
        Self {
            event_type: event_type.into(),
            run_id,
            scene_index: None,
            status: None,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// A `scene.status` event.
    pub fn scene_status(run_id: RunId, index: usize, status: SceneStatus) -> Self {
        let mut event = Self::new(SCENE_STATUS, run_id);
        event.scene_index = Some(index);
        event.status = Some(status);
        event
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out bus; every subscriber receives every event published after it
/// subscribed.
///
/// ```rust
/// use atelier_pipeline::events::{EventBus, PipelineEvent, RUN_STARTED};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(PipelineEvent::new(RUN_STARTED, uuid::Uuid::new_v4()));
/// assert!(rx.try_recv().is_ok());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers observe `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: PipelineEvent) {
        // Only fails when nobody is subscribed.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
