//! Speechcast TTS Server - blocking and streaming speech synthesis over HTTP

use speechcast_core::broadcast::spawn_clock;
use speechcast_core::{AzureBackend, Hub, ServerConfig};
use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod error;
mod state;

use state::AppState;

const CONFIG_FILE: &str = "speechcast";
const ENV_PREFIX: &str = "SPEECHCAST";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "speechcast_server=debug,speechcast_core=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Speechcast TTS Server");

    // Load configuration
    let config = load_config(CONFIG_FILE)?;
    info!("Output directory: {:?}", config.output_dir);

    let hub = Hub::spawn();
    let clock = spawn_clock(hub.clone(), config.broadcast_interval());
    let backend = Arc::new(AzureBackend::new()?);

    let addr = config.bind_addr();
    let grace = config.shutdown_grace();
    let state = AppState::new(hub, backend, config);

    // Build router
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on http://{}", addr);

    let (signalled_tx, signalled_rx) = oneshot::channel();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    tokio::select! {
        result = server => result?,
        _ = grace_elapsed(signalled_rx, grace) => {
            warn!("Shutdown grace period of {:?} elapsed, closing open connections", grace);
        }
    }

    clock.abort();
    info!("Server shutdown complete");
    Ok(())
}

/// Layer `<name>.toml` (optional) under `SPEECHCAST__*` environment variables.
fn load_config(name: &str) -> anyhow::Result<ServerConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::with_name(name).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;
    Ok(settings.try_deserialize()?)
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}

/// Resolves `grace` after the shutdown signal; never if the server exits first.
async fn grace_elapsed(signalled: oneshot::Receiver<()>, grace: Duration) {
    if signalled.await.is_err() {
        std::future::pending::<()>().await;
    }
    tokio::time::sleep(grace).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let name = dir.path().join("absent");
        let config = load_config(name.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.synthesis.read_chunk_size, 2048);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("speechcast.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "port = 9090\nbroadcast_interval_secs = 3").unwrap();
        writeln!(file, "[synthesis]\nhandshake_timeout_secs = 5").unwrap();

        let name = dir.path().join("speechcast");
        let config = load_config(name.to_str().unwrap()).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.broadcast_interval(), Duration::from_secs(3));
        assert_eq!(config.synthesis.handshake_timeout(), Duration::from_secs(5));
        assert_eq!(config.host, "0.0.0.0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_starts_after_signal() {
        let (tx, rx) = oneshot::channel();
        let waiter = tokio::spawn(grace_elapsed(rx, Duration::from_secs(2)));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!waiter.is_finished());

        tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(3), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
