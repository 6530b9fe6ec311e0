use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use atelier_genai::{GenAiClient, GenerativeBackend, RetryPolicy, Retrying};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use atelier_api::config::ServerConfig;
use atelier_api::router::build_app_router;
use atelier_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "atelier_api=debug,atelier_pipeline=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");
    if config.api_key.is_none() {
        tracing::warn!("No generative API key configured; generation requests will be rejected");
    }

    // --- Generative backend ---
    let client = GenAiClient::with_client(
        reqwest::Client::new(),
        &config.genai_base_url,
        config.api_key.clone().unwrap_or_default(),
        config.models.clone(),
    );
    let backend: Arc<dyn GenerativeBackend> =
        Arc::new(Retrying::new(client, RetryPolicy::default()));
    tracing::info!(base_url = %config.genai_base_url, "Generative backend ready");
    match &config.store {
        Some(store) => tracing::info!(url = %store.url, "Backend store configured"),
        None => tracing::info!("No backend store configured; account and gallery routes are disabled"),
    }

    // --- App state ---
    let state = AppState::new(config.clone(), backend);
    let runs = Arc::clone(&state.runs);

    // --- Router ---
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cancelling runs");

    // Runs stop between scenes; a scene mid-poll may need the full timeout.
    let drained = runs
        .shutdown(Duration::from_secs(config.shutdown_timeout_secs))
        .await;
    if drained {
        tracing::info!("All runs stopped");
    } else {
        tracing::warn!(
            timeout_secs = config.shutdown_timeout_secs,
            "Runs still in flight at shutdown timeout"
        );
    }

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
