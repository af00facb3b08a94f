use std::sync::Arc;

use generator::OpenAiGenerator;
use server::{AppState, http};
use store::DocumentStore;
use tracing_subscriber::{EnvFilter, prelude::*};
use utils::assets::{documents_dir, site_dir, uploads_dir};

const DEFAULT_PORT: u16 = 3001;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    let filter_string = format!(
        "warn,server={level},services={level},generator={level},store={level},utils={level}",
        level = log_level
    );
    let env_filter = EnvFilter::try_new(filter_string)?;
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(env_filter))
        .init();

    for dir in [documents_dir(), uploads_dir(), site_dir()] {
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
    }

    let client = Arc::new(OpenAiGenerator::from_env()?);
    let state = AppState::new(
        DocumentStore::new(documents_dir()),
        client,
        site_dir(),
        uploads_dir(),
    );

    // First-boot bootstrap: defaults for history/profile and the
    // placeholder site files. No-ops when state already exists.
    state.chat().ensure_defaults().await?;
    state.site().ensure_defaults().await?;

    let app = http::router(state);

    let port = std::env::var("PORT")
        .ok()
        .and_then(|value| value.trim().parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let actual_port = listener.local_addr()?.port();
    tracing::info!("Server running on http://{host}:{actual_port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install Ctrl+C handler: {err}");
        return;
    }
    tracing::info!("Shutdown signal received, stopping server");
}
