//! DM Screen server
//!
//! Serves the canvas session, scene layouts and module content over a JSON
//! REST API. All canvas writes go through one session and are persisted by a
//! background flush of the write queue.
//!
//! ## Environment
//!
//! - `DM_SCREEN_CONFIG`: path to a JSON `ScreenConfig` (optional)
//! - `DM_SCREEN_DATA_DIR`: data directory, overrides the config
//! - `PORT`: listen port, default 3030

mod error;
mod persistence;
mod routes;
mod state;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use dmscreen_core::{FileStorage, ScreenConfig, Storage};
use tracing::{info, warn};

const DEFAULT_PORT: u16 = 3030;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dmscreen_server=info,dmscreen_core=info,tower_http=info".into()),
        )
        .init();

    let config = match std::env::var_os("DM_SCREEN_CONFIG") {
        Some(path) => ScreenConfig::load(&PathBuf::from(path)).expect("invalid DM_SCREEN_CONFIG"),
        None => ScreenConfig::default(),
    };

    let data_dir = std::env::var_os("DM_SCREEN_DATA_DIR")
        .map(PathBuf::from)
        .or_else(|| config.data_dir.clone());
    let storage = match data_dir {
        Some(dir) => FileStorage::new(dir),
        None => FileStorage::default_location(),
    }
    .expect("failed to open data directory");
    info!(path = %storage.base_path().display(), "using file storage");
    let storage: Arc<dyn Storage> = Arc::new(storage);

    let state = state::AppState::load(&config, storage)
        .await
        .expect("failed to load scenes");

    let flush_task = persistence::spawn_flush_task(state.clone(), config.flush_interval_ms);

    let port = match std::env::var("PORT") {
        Ok(value) => value.parse().expect("invalid PORT"),
        Err(_) => DEFAULT_PORT,
    };
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("failed to bind");
    info!(%addr, "DM Screen server listening");

    axum::serve(listener, routes::app(state.clone()))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server failed");

    flush_task.abort();
    let report = persistence::flush_pending(&state).await;
    if report.failed > 0 {
        warn!(failed = report.failed, "writes lost at shutdown");
    }
    info!("DM Screen server stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
