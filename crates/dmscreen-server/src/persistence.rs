//! Background flush of the write queue.
//!
//! Handlers only submit jobs. This task applies them on a fixed interval;
//! failures are logged by the core and the jobs dropped. Every flush,
//! including the one a scene load starts with, runs under `flush_lock`.

use std::time::Duration;

use dmscreen_core::session::{CanvasSession, SessionResult};
use dmscreen_core::storage::{FlushReport, flush};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::state::AppState;

/// Spawn the flush loop. Returns a handle for shutdown.
pub fn spawn_flush_task(state: AppState, interval_ms: u64) -> JoinHandle<()> {
    info!(interval_ms, "write queue flush configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            flush_pending(&state).await;
        }
    })
}

/// Apply every pending write now.
pub async fn flush_pending(state: &AppState) -> FlushReport {
    let _flushing = state.flush_lock.lock().await;
    let report = flush(&state.queue, &state.gateway).await;
    if report.failed > 0 {
        warn!(applied = report.applied, failed = report.failed, "flush had failures");
    } else if report.applied > 0 {
        debug!(applied = report.applied, "flushed writes");
    }
    report
}

/// Switch the session to a persisted scene. The flush that precedes the
/// load is serialised with the background task.
pub async fn load_scene(
    state: &AppState,
    session: &mut CanvasSession,
    scene_id: &str,
) -> SessionResult<()> {
    let _flushing = state.flush_lock.lock().await;
    session.load_scene(&state.gateway, scene_id).await
}
