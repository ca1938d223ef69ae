//! Shared application state.
//!
//! `AppState` is injected into handlers via the `State` extractor. The
//! session is the single writer of canvas state; handlers lock it for the
//! duration of one operation and never hold it across storage I/O other
//! than a scene load.

use std::sync::Arc;

use dmscreen_core::storage::list_records;
use dmscreen_core::{
    CanvasSession, MidiMapping, MidiRouter, SceneGateway, ScreenConfig, Storage, WriteQueue,
};
use tokio::sync::Mutex;

use crate::error::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<CanvasSession>>,
    pub storage: Arc<dyn Storage>,
    pub gateway: SceneGateway<dyn Storage>,
    pub queue: WriteQueue,
    /// Held for the whole of a flush so batches reach storage in order.
    pub flush_lock: Arc<Mutex<()>>,
    pub midi: Arc<Mutex<MidiRouter>>,
}

impl AppState {
    pub fn new(config: &ScreenConfig, storage: Arc<dyn Storage>) -> Self {
        let queue = WriteQueue::new();
        Self {
            session: Arc::new(Mutex::new(CanvasSession::new(config, queue.clone()))),
            gateway: SceneGateway::new(Arc::clone(&storage)),
            storage,
            queue,
            flush_lock: Arc::new(Mutex::new(())),
            midi: Arc::new(Mutex::new(MidiRouter::default())),
        }
    }

    /// Build the state and load the persisted scenes and MIDI mappings.
    pub async fn load(config: &ScreenConfig, storage: Arc<dyn Storage>) -> Result<Self, ApiError> {
        let state = Self::new(config, storage);
        state.session.lock().await.load_scenes(&state.gateway).await?;

        let mappings: Vec<MidiMapping> = list_records(state.storage.as_ref()).await?;
        tracing::info!(mappings = mappings.len(), "loaded MIDI mappings");
        *state.midi.lock().await = MidiRouter::new(mappings);
        Ok(state)
    }
}

#[cfg(test)]
pub(crate) async fn test_state() -> AppState {
    use dmscreen_core::MemoryStorage;

    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    match AppState::load(&ScreenConfig::default(), storage).await {
        Ok(state) => state,
        Err(e) => panic!("test state failed to load: {e}"),
    }
}
