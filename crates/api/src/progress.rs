//! Server-sent progress stream for one run.
//!
//! A client first receives a `run.snapshot` event with the full run view,
//! then every pipeline event for that run. The stream ends after
//! `run.finished`, or right after the snapshot when the run is already over.

use std::sync::Arc;

use atelier_pipeline::events::{PipelineEvent, RUN_FINISHED};
use axum::response::sse::Event;
use futures::Stream;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

use crate::runs::RunHandle;

pub const SNAPSHOT_EVENT: &str = "run.snapshot";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Snapshot,
    Live,
    Done,
}

struct Cursor {
    handle: Arc<RunHandle>,
    events: broadcast::Receiver<PipelineEvent>,
    phase: Phase,
}

/// Build the stream. `events` must be subscribed before calling so nothing
/// published after the snapshot is missed.
pub fn run_events(
    handle: Arc<RunHandle>,
    events: broadcast::Receiver<PipelineEvent>,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    let cursor = Cursor {
        handle,
        events,
        phase: Phase::Snapshot,
    };
    futures::stream::unfold(cursor, |mut cursor| async move {
        loop {
            match cursor.phase {
                Phase::Done => return None,
                Phase::Snapshot => {
                    let view = cursor.handle.view().await;
                    cursor.phase = if view.state.is_terminal() {
                        Phase::Done
                    } else {
                        Phase::Live
                    };
                    let event = Event::default().event(SNAPSHOT_EVENT).json_data(&view);
                    return Some((event, cursor));
                }
                Phase::Live => match cursor.events.recv().await {
                    Ok(event) if event.run_id == cursor.handle.id => {
                        if event.event_type == RUN_FINISHED {
                            cursor.phase = Phase::Done;
                        }
                        let sse = Event::default()
                            .event(event.event_type.as_str())
                            .json_data(&event);
                        return Some((sse, cursor));
                    }
                    Ok(_) => {}
                    // Dropped events may include run.finished; resync from state.
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(run_id = %cursor.handle.id, skipped, "Progress stream lagged");
                        cursor.phase = Phase::Snapshot;
                    }
                    Err(RecvError::Closed) => return None,
                },
            }
        }
    })
}
