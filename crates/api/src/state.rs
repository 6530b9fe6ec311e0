use std::sync::Arc;
use std::time::Duration;

use atelier_core::context::AppContext;
use atelier_core::error::CoreError;
use atelier_genai::{GenerativeBackend, PollConfig};
use atelier_pipeline::{BatchOptions, EventBus, FailurePolicy};
use atelier_store::StoreClient;
use tokio::sync::RwLock;

use crate::config::ServerConfig;
use crate::error::AppError;
use crate::runs::RunRegistry;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// API key and signed-in session, shared with every request.
    pub context: Arc<RwLock<AppContext>>,
    /// Generative API backend, already wrapped in retry-with-backoff.
    pub backend: Arc<dyn GenerativeBackend>,
    /// Pipeline runs started through the API.
    pub runs: Arc<RunRegistry>,
    /// Scene and run progress events.
    pub event_bus: Arc<EventBus>,
    /// Backend store client, when configured.
    pub store: Option<Arc<StoreClient>>,
}

impl AppState {
    pub fn new(config: ServerConfig, backend: Arc<dyn GenerativeBackend>) -> Self {
        let context = AppContext::new(config.api_key.clone());
        let store = config
            .store
            .clone()
            .map(|store| Arc::new(StoreClient::new(store)));
        Self {
            runs: Arc::new(RunRegistry::with_retention(config.run_retention)),
            config: Arc::new(config),
            context: Arc::new(RwLock::new(context)),
            backend,
            event_bus: Arc::new(EventBus::default()),
            store,
        }
    }

    /// The store client, or [`AppError::StoreNotConfigured`].
    pub fn store(&self) -> Result<&StoreClient, AppError> {
        self.store.as_deref().ok_or(AppError::StoreNotConfigured)
    }

    /// Fail fast when no API key is configured, before any backend call.
    pub async fn require_api_key(&self) -> Result<(), CoreError> {
        self.context.read().await.require_api_key().map(|_| ())
    }

    /// Pipeline options for a run, with polling taken from the server config.
    pub fn batch_options(
        &self,
        delay_secs: u64,
        failure_policy: FailurePolicy,
        images_only: bool,
    ) -> BatchOptions {
        BatchOptions {
            delay: Duration::from_secs(delay_secs),
            failure_policy,
            poll: PollConfig {
                interval: Duration::from_secs(self.config.video_poll_interval_secs),
                ..PollConfig::default()
            },
            images_only,
        }
    }
}
