pub mod api;
pub mod cli_args;
pub mod error;
pub mod telemetry;
pub mod views;

use std::sync::Arc;

use anyhow::{Context, Result};
use kanban_config::{ConnectionDefaults, SettingsStore};

pub use api::{build_router, AppState, Clock, SharedState};
pub use cli_args::Args;

/// Binds the listener and serves until Ctrl+C.
pub async fn serve(args: &Args) -> Result<()> {
    let store = args
        .settings
        .clone()
        .map(SettingsStore::new)
        .unwrap_or_else(SettingsStore::from_env);
    let state = Arc::new(AppState::new(store, ConnectionDefaults::from_env()));
    let app = build_router(state.clone());

    let addr = args.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;
    let local_addr = listener.local_addr()?;
    tracing::info!(
        addr = %local_addr,
        settings = %state.store.path().display(),
        "API listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}
