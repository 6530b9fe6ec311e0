//! Client library for the generative-AI REST API.
//!
//! Provides the HTTP client, typed error kinds classified where the error
//! originates, the retry-with-backoff helper, the [`GenerativeBackend`]
//! trait the pipelines are written against, and the video poll loop.

pub mod backend;
pub mod client;
pub mod error;
pub mod retry;
pub mod video;
pub mod wire;

pub use backend::{GenerativeBackend, OperationStatus, Retrying, VideoOperation};
pub use client::GenAiClient;
pub use error::{ErrorKind, GenAiError};
pub use retry::{with_retry, RetryPolicy};
pub use video::{generate_video, wait_for_video, PollConfig};
