//! Domain types and pure logic for the Atelier generative studio.
//!
//! Everything in this crate is independent of the external generative API
//! and the HTTP layer: generation jobs, scene storyboards and their status
//! machine, character universes, model configuration, the batch prompt
//! loader, the application context, and the FFmpeg helpers used to merge
//! finished clips.

pub mod audio;
pub mod batch;
pub mod character;
pub mod context;
pub mod error;
pub mod ffmpeg;
pub mod job;
pub mod model;
pub mod naming;
pub mod scene;
pub mod types;
