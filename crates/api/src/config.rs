use atelier_core::context::API_KEY_ENV_VARS;
use atelier_core::model::{ModelConfig, ModelSet};
use atelier_genai::client::DEFAULT_BASE_URL;
use atelier_store::StoreConfig;

use crate::runs::DEFAULT_RETAINED_RUNS;

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Time given to running pipelines after the server stops accepting
    /// connections (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Generative API key served by `/api/key` and used for all runs.
    pub api_key: Option<String>,
    /// Base URL of the generative API.
    pub genai_base_url: String,
    /// Models used by pipeline runs.
    pub models: ModelSet,
    /// Wait between video status queries, in seconds (default: `10`).
    pub video_poll_interval_secs: u64,
    /// Finished runs kept for polling (default: `100`).
    pub run_retention: usize,
    /// Backend store for accounts and saved images; `None` disables the
    /// `/auth` and `/gallery` routes.
    pub store: Option<StoreConfig>,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                     | Default                    |
    /// |-----------------------------|----------------------------|
    /// | `HOST`                      | `0.0.0.0`                  |
    /// | `PORT`                      | `3000`                     |
    /// | `CORS_ORIGINS`              | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`      | `30`                       |
    /// | `SHUTDOWN_TIMEOUT_SECS`     | `30`                       |
    /// | `GEMINI_API_KEY`/`API_KEY`  | unset                      |
    /// | `GENAI_BASE_URL`            | public v1beta endpoint     |
    /// | `TEXT_MODEL`                | `gemini-2.5-flash`         |
    /// | `IMAGE_MODEL`               | `imagen-4.0-generate-001`  |
    /// | `VIDEO_MODEL`               | `veo-3.0-generate-001`     |
    /// | `SPEECH_MODEL`              | `gemini-2.5-flash-preview-tts` |
    /// | `VIDEO_POLL_INTERVAL_SECS`  | `10`                       |
    /// | `RUN_RETENTION`             | `100`                      |
    /// | `STORE_URL`/`STORE_ANON_KEY`| unset                      |
    ///
    /// # Panics
    ///
    /// Panics on unparsable numbers so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let api_key = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .map(|v| v.trim().to_string())
            .find(|v| !v.is_empty());

        let genai_base_url =
            std::env::var("GENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());

        let mut models = ModelSet::default();
        override_model(&mut models.text, "TEXT_MODEL");
        override_model(&mut models.image, "IMAGE_MODEL");
        override_model(&mut models.video, "VIDEO_MODEL");
        override_model(&mut models.speech, "SPEECH_MODEL");
        models.validate().expect("model configuration must be valid");

        let video_poll_interval_secs: u64 = std::env::var("VIDEO_POLL_INTERVAL_SECS")
            .unwrap_or_else(|_| "10".into())
            .parse()
            .expect("VIDEO_POLL_INTERVAL_SECS must be a valid u64");

        let run_retention: usize = std::env::var("RUN_RETENTION")
            .unwrap_or_else(|_| DEFAULT_RETAINED_RUNS.to_string())
            .parse()
            .expect("RUN_RETENTION must be a valid usize");

        let store = StoreConfig::from_env();

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            api_key,
            genai_base_url,
            models,
            video_poll_interval_secs,
            run_retention,
            store,
        }
    }
}

/// Replace the model id of `slot` when `var` is set.
fn override_model(slot: &mut ModelConfig, var: &str) {
    let Ok(id) = std::env::var(var) else { return };
    let id = id.trim().to_string();
    if id.is_empty() {
        return;
    }
    match slot {
        ModelConfig::Text { model_id, .. }
        | ModelConfig::Image { model_id, .. }
        | ModelConfig::Video { model_id, .. }
        | ModelConfig::Speech { model_id, .. } => *model_id = id,
    }
}
