//! Canvas session state: current scene, selection, grid snap, modal and the
//! refresh counter.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use dmscreen_core::session::SessionError;
use dmscreen_core::{CanvasStore, Viewport};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::persistence::load_scene;
use crate::routes::scenes::nullable;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionBody {
    #[serde(default)]
    pub grid_snap: Option<bool>,
    /// `null` clears the selection.
    #[serde(default, deserialize_with = "nullable")]
    pub selected_node_id: Option<Option<String>>,
    #[serde(default)]
    pub viewport: Option<Viewport>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchSceneBody {
    pub scene_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenModalBody {
    pub node_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub refresh_counter: u64,
}

/// `GET /api/session`
pub async fn get_session(State(state): State<AppState>) -> Json<CanvasStore> {
    Json(state.session.lock().await.store().clone())
}

/// `PATCH /api/session`
pub async fn update_session(
    State(state): State<AppState>,
    Json(body): Json<UpdateSessionBody>,
) -> Result<Json<CanvasStore>, ApiError> {
    if body.viewport.is_some_and(|v| v.sanitized().is_none()) {
        return Err(SessionError::InvalidViewport.into());
    }
    let mut session = state.session.lock().await;
    if let Some(selected) = body.selected_node_id {
        session.select(selected.as_deref())?;
    }
    if let Some(viewport) = body.viewport {
        session.set_viewport(viewport)?;
    }
    if let Some(enabled) = body.grid_snap {
        session.set_grid_snap(enabled);
    }
    Ok(Json(session.store().clone()))
}

/// `PUT /api/session/scene`: switch scenes. Pending writes are flushed
/// before the scene is loaded.
pub async fn switch_scene(
    State(state): State<AppState>,
    Json(body): Json<SwitchSceneBody>,
) -> Result<Json<CanvasStore>, ApiError> {
    let mut session = state.session.lock().await;
    load_scene(&state, &mut session, &body.scene_id).await?;
    tracing::info!(scene_id = %body.scene_id, "switched scene");
    Ok(Json(session.store().clone()))
}

/// `POST /api/session/modal`
pub async fn open_modal(
    State(state): State<AppState>,
    Json(body): Json<OpenModalBody>,
) -> Result<StatusCode, ApiError> {
    state.session.lock().await.open_modal(&body.node_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `DELETE /api/session/modal`
pub async fn close_modal(State(state): State<AppState>) -> StatusCode {
    state.session.lock().await.close_modal();
    StatusCode::NO_CONTENT
}

/// `POST /api/session/refresh`
pub async fn refresh(State(state): State<AppState>) -> Json<RefreshResponse> {
    let refresh_counter = state.session.lock().await.trigger_refresh();
    Json(RefreshResponse { refresh_counter })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use dmscreen_core::ModuleKind;

    #[tokio::test]
    async fn test_session_snapshot_serializes_camel_case() {
        let state = test_state().await;
        let Json(store) = get_session(State(state)).await;
        let value = serde_json::to_value(&store).unwrap();
        assert_eq!(value["currentSceneId"], "default");
        assert_eq!(value["gridSnap"], true);
        assert_eq!(value["refreshCounter"], 0);
    }

    #[tokio::test]
    async fn test_update_session_flags() {
        let state = test_state().await;
        let node = state.session.lock().await.add_module(ModuleKind::Note);

        let body: UpdateSessionBody = serde_json::from_value(serde_json::json!({
            "gridSnap": false,
            "selectedNodeId": node.id,
        }))
        .unwrap();
        let Json(store) = update_session(State(state.clone()), Json(body)).await.unwrap();
        assert!(!store.grid_snap());
        assert_eq!(store.selected_node_id(), Some(node.id.as_str()));

        let body: UpdateSessionBody =
            serde_json::from_str(r#"{"selectedNodeId":null}"#).unwrap();
        let Json(store) = update_session(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(store.selected_node_id(), None);

        let body: UpdateSessionBody =
            serde_json::from_str(r#"{"selectedNodeId":"ghost"}"#).unwrap();
        let err = update_session(State(state), Json(body)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_viewport_updates_are_checked() {
        let state = test_state().await;
        let body: UpdateSessionBody =
            serde_json::from_str(r#"{"viewport":{"x":0,"y":0,"zoom":0}}"#).unwrap();
        let Json(store) = update_session(State(state.clone()), Json(body)).await.unwrap();
        assert_eq!(store.viewport().zoom, dmscreen_core::viewport::MIN_ZOOM);

        let node = state.session.lock().await.add_module(ModuleKind::Note);
        assert!(node.position.x.is_finite() && node.position.y.is_finite());

        let body = UpdateSessionBody {
            grid_snap: Some(false),
            viewport: Some(Viewport::new(f64::NAN, 0.0, 1.0)),
            ..Default::default()
        };
        let err = update_session(State(state.clone()), Json(body)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert!(state.session.lock().await.store().grid_snap());
    }

    #[tokio::test]
    async fn test_switch_scene_round_trip() {
        let state = test_state().await;
        let scene = {
            let mut session = state.session.lock().await;
            let scene = session.create_scene(Some("Crypt".to_string()));
            session.add_module(ModuleKind::Initiative);
            scene
        };

        let Json(store) = switch_scene(
            State(state.clone()),
            Json(SwitchSceneBody {
                scene_id: "default".to_string(),
            }),
        )
        .await
        .unwrap();
        assert_eq!(store.current_scene_id(), "default");
        assert!(store.nodes().is_empty());

        let Json(store) = switch_scene(
            State(state.clone()),
            Json(SwitchSceneBody { scene_id: scene.id }),
        )
        .await
        .unwrap();
        assert_eq!(store.nodes().len(), 1);

        let err = switch_scene(
            State(state),
            Json(SwitchSceneBody {
                scene_id: "nowhere".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_modal_and_refresh() {
        let state = test_state().await;
        let node = state.session.lock().await.add_module(ModuleKind::Statblock);

        open_modal(State(state.clone()), Json(OpenModalBody { node_id: node.id.clone() }))
            .await
            .unwrap();
        let modal = state.session.lock().await.store().modal().cloned().unwrap();
        assert_eq!(modal.module_type, "statblock");

        assert_eq!(close_modal(State(state.clone())).await, StatusCode::NO_CONTENT);
        assert!(state.session.lock().await.store().modal().is_none());

        let Json(first) = refresh(State(state.clone())).await;
        let Json(second) = refresh(State(state)).await;
        assert_eq!(second.refresh_counter, first.refresh_counter + 1);
    }
}
