//! Scene and node routes.
//!
//! Node mutations are only accepted for the current scene; they run through
//! the session so placement is resolved and the write is queued.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use dmscreen_core::session::{CanvasSession, SessionError};
use dmscreen_core::storage::delete_record;
use dmscreen_core::{MidiMapping, ModuleConfig, ModuleKind, Node, Scene, Viewport};
use kurbo::{Point, Size};
use serde::{Deserialize, Deserializer};

use crate::error::ApiError;
use crate::persistence::{flush_pending, load_scene};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSceneBody {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateSceneBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeBody {
    #[serde(rename = "type")]
    pub kind: ModuleKind,
    /// Screen point to place the module at. Defaults to the screen centre.
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub reference_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNodeBody {
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub size: Option<Size>,
    #[serde(default)]
    pub config: Option<ModuleConfig>,
    /// `null` detaches the content record.
    #[serde(default, deserialize_with = "nullable")]
    pub reference_id: Option<Option<String>>,
}

/// Distinguish an absent field (`None`) from an explicit `null` (`Some(None)`).
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn require_current(session: &CanvasSession, scene_id: &str) -> Result<(), ApiError> {
    if session.store().scene(scene_id).is_none() {
        return Err(ApiError::NotFound(format!("Unknown scene: {scene_id}")));
    }
    if session.store().current_scene_id() != scene_id {
        return Err(ApiError::Conflict(format!("Scene {scene_id} is not the current scene")));
    }
    Ok(())
}

fn node_in(session: &CanvasSession, node_id: &str) -> Result<Node, ApiError> {
    session
        .store()
        .node(node_id)
        .cloned()
        .ok_or_else(|| ApiError::NotFound(format!("Unknown node: {node_id}")))
}

/// `GET /api/scenes`
pub async fn list_scenes(State(state): State<AppState>) -> Json<Vec<Scene>> {
    Json(state.session.lock().await.store().scenes().to_vec())
}

/// `POST /api/scenes`: create a scene and switch to it.
pub async fn create_scene(
    State(state): State<AppState>,
    Json(body): Json<CreateSceneBody>,
) -> (StatusCode, Json<Scene>) {
    let scene = state.session.lock().await.create_scene(body.name);
    tracing::info!(scene_id = %scene.id, name = %scene.name, "created scene");
    (StatusCode::CREATED, Json(scene))
}

/// `GET /api/scenes/{scene_id}`
pub async fn get_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> Result<Json<Scene>, ApiError> {
    let session = state.session.lock().await;
    session
        .store()
        .scene(&scene_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown scene: {scene_id}")))
}

/// `PATCH /api/scenes/{scene_id}`: rename and/or set the viewport.
pub async fn update_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
    Json(body): Json<UpdateSceneBody>,
) -> Result<Json<Scene>, ApiError> {
    if body.viewport.is_some_and(|v| v.sanitized().is_none()) {
        return Err(SessionError::InvalidViewport.into());
    }
    let mut session = state.session.lock().await;
    if let Some(name) = &body.name {
        session.rename_scene(&scene_id, name)?;
    }
    if let Some(viewport) = body.viewport {
        session.set_scene_viewport(&scene_id, viewport)?;
    }
    session
        .store()
        .scene(&scene_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Unknown scene: {scene_id}")))
}

/// `DELETE /api/scenes/{scene_id}`: deletes the scene and its nodes. When
/// the current scene goes, the first remaining scene is loaded.
pub async fn delete_scene(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut session = state.session.lock().await;
    let switched_to = session.delete_scene(&scene_id)?;
    if let Some(next) = switched_to {
        load_scene(&state, &mut session, &next).await?;
    }
    tracing::info!(%scene_id, "deleted scene");
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/scenes/{scene_id}/nodes`
pub async fn list_nodes(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
) -> Result<Json<Vec<Node>>, ApiError> {
    {
        let session = state.session.lock().await;
        if session.store().scene(&scene_id).is_none() {
            return Err(ApiError::NotFound(format!("Unknown scene: {scene_id}")));
        }
        if session.store().current_scene_id() == scene_id {
            return Ok(Json(session.store().nodes().to_vec()));
        }
    }
    flush_pending(&state).await;
    Ok(Json(state.gateway.load_scene_nodes(&scene_id).await?))
}

/// `POST /api/scenes/{scene_id}/nodes`: add a module, resolving its placement.
pub async fn create_node(
    State(state): State<AppState>,
    Path(scene_id): Path<String>,
    Json(body): Json<CreateNodeBody>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let mut session = state.session.lock().await;
    require_current(&session, &scene_id)?;
    let node = match body.position {
        Some(point) => session.add_module_at(body.kind, point),
        None => session.add_module(body.kind),
    };
    if body.reference_id.is_some() {
        session.set_node_reference(&node.id, body.reference_id)?;
    }
    Ok((StatusCode::CREATED, Json(node_in(&session, &node.id)?)))
}

/// `PATCH /api/scenes/{scene_id}/nodes/{node_id}`
pub async fn update_node(
    State(state): State<AppState>,
    Path((scene_id, node_id)): Path<(String, String)>,
    Json(body): Json<UpdateNodeBody>,
) -> Result<Json<Node>, ApiError> {
    let mut session = state.session.lock().await;
    require_current(&session, &scene_id)?;
    node_in(&session, &node_id)?;
    if let Some(config) = &body.config {
        session.check_config(&node_id, config)?;
    }

    if let Some(size) = body.size {
        session.resize_node(&node_id, size)?;
    }
    if let Some(config) = body.config {
        session.update_node_config(&node_id, config)?;
    }
    if let Some(reference_id) = body.reference_id {
        session.set_node_reference(&node_id, reference_id)?;
    }
    if let Some(point) = body.position {
        session.drop_node(&node_id, point)?;
    }
    Ok(Json(node_in(&session, &node_id)?))
}

/// `DELETE /api/scenes/{scene_id}/nodes/{node_id}`: also removes the MIDI
/// mappings that drive the node. A mapping record that fails to delete is
/// logged; the node is gone either way.
pub async fn delete_node(
    State(state): State<AppState>,
    Path((scene_id, node_id)): Path<(String, String)>,
) -> Result<StatusCode, ApiError> {
    {
        let mut session = state.session.lock().await;
        require_current(&session, &scene_id)?;
        session.delete_node(&node_id)?;
    }

    let removed = state.midi.lock().await.remove_mappings_for_node(&node_id);
    for mapping in removed {
        if let Err(e) = delete_record::<_, MidiMapping>(state.storage.as_ref(), &mapping.id).await {
            tracing::warn!(mapping_id = %mapping.id, %node_id, error = %e, "failed to delete MIDI mapping");
        }
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DropBody {
    pub x: f64,
    pub y: f64,
}

/// `POST /api/scenes/{scene_id}/nodes/{node_id}/drop`: end of a drag.
pub async fn drop_node(
    State(state): State<AppState>,
    Path((scene_id, node_id)): Path<(String, String)>,
    Json(body): Json<DropBody>,
) -> Result<Json<Node>, ApiError> {
    let mut session = state.session.lock().await;
    require_current(&session, &scene_id)?;
    session.drop_node(&node_id, Point::new(body.x, body.y))?;
    Ok(Json(node_in(&session, &node_id)?))
}
