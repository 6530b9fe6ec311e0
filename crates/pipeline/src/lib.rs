//! Generation pipelines.
//!
//! A pipeline run walks an ordered list of scenes, one at a time, driving
//! each through image, video and (for stories) narration generation on a
//! [`GenerativeBackend`](atelier_genai::GenerativeBackend). Progress is kept
//! in a shared scene snapshot and published on an [`EventBus`].

pub mod ad;
pub mod batch;
pub mod error;
pub mod events;
pub mod export;
pub mod merge;
pub mod story;
pub mod variations;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::{BatchOptions, FailurePolicy, Pipeline, RunOutcome, RunReport};
pub use error::PipelineError;
pub use events::{EventBus, PipelineEvent};
