//! MIDI mappings, learn mode and raw message intake.
//!
//! Raw bytes are posted by whatever owns the controller; the router turns
//! them into commands which the session applies to the current scene.

use std::time::Instant;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use dmscreen_core::midi::MidiTarget;
use dmscreen_core::storage::{delete_record, save_record};
use dmscreen_core::{CommandBus, Dispatch, MidiMapping, RouteOutcome};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::routes::apply_patch;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMappingBody {
    #[serde(default)]
    pub label: String,
    pub target_type: MidiTarget,
    pub node_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MessageBody {
    pub data: Vec<u8>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MessageResponse {
    Ignored,
    Learned { mapping: MidiMapping },
    Dispatched { commands: Vec<Dispatch>, applied: usize },
}

/// `GET /api/midi/mappings`
pub async fn list_mappings(State(state): State<AppState>) -> Json<Vec<MidiMapping>> {
    Json(state.midi.lock().await.mappings().to_vec())
}

/// `POST /api/midi/mappings`: new mappings listen on CC 0 of channel 0
/// until learned or edited.
pub async fn create_mapping(
    State(state): State<AppState>,
    Json(body): Json<CreateMappingBody>,
) -> Result<(StatusCode, Json<MidiMapping>), ApiError> {
    if body.target_type == MidiTarget::AudioSceneChannelVolume && body.channel_id.is_none() {
        return Err(ApiError::BadRequest(
            "Channel volume mappings need a channelId".to_string(),
        ));
    }
    let mut mapping = MidiMapping::new(body.label, body.target_type, body.node_id);
    mapping.channel_id = body.channel_id;

    save_record(state.storage.as_ref(), &mapping).await?;
    state.midi.lock().await.upsert_mapping(mapping.clone());
    tracing::info!(mapping_id = %mapping.id, node_id = %mapping.node_id, "created MIDI mapping");
    Ok((StatusCode::CREATED, Json(mapping)))
}

/// `PATCH /api/midi/mappings/{id}`
pub async fn update_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<MidiMapping>, ApiError> {
    let current = state
        .midi
        .lock()
        .await
        .mapping(&id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Unknown MIDI mapping: {id}")))?;
    let mapping = apply_patch(&current, patch)?;

    save_record(state.storage.as_ref(), &mapping).await?;
    state.midi.lock().await.upsert_mapping(mapping.clone());
    Ok(Json(mapping))
}

/// `DELETE /api/midi/mappings/{id}`
pub async fn delete_mapping(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.midi.lock().await.remove_mapping(&id)?;
    delete_record::<_, MidiMapping>(state.storage.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/midi/learn/{id}`: the next message is assigned to the mapping.
pub async fn start_learn(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.midi.lock().await.start_learn(&id, Instant::now())?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/midi/learn`
pub async fn cancel_learn(State(state): State<AppState>) -> StatusCode {
    state.midi.lock().await.cancel_learn();
    StatusCode::NO_CONTENT
}

/// `POST /api/midi/messages`: route one raw message.
pub async fn receive_message(
    State(state): State<AppState>,
    Json(body): Json<MessageBody>,
) -> Result<Json<MessageResponse>, ApiError> {
    let outcome = state.midi.lock().await.handle(&body.data, Instant::now());
    match outcome {
        RouteOutcome::Ignored => Ok(Json(MessageResponse::Ignored)),
        RouteOutcome::Learned(mapping) => {
            save_record(state.storage.as_ref(), &mapping).await?;
            Ok(Json(MessageResponse::Learned { mapping }))
        }
        RouteOutcome::Dispatched(commands) => {
            let mut session = state.session.lock().await;
            let applied = commands.iter().filter(|d| session.apply_midi(d)).count();
            tracing::debug!(dispatched = commands.len(), applied, "routed MIDI message");
            Ok(Json(MessageResponse::Dispatched { commands, applied }))
        }
    }
}

/// `GET /api/midi/commands`: the latest command per module and channel.
pub async fn list_commands(State(state): State<AppState>) -> Json<CommandBus> {
    Json(state.midi.lock().await.bus().clone())
}
