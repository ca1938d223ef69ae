//! Router assembly.

pub mod content;
pub mod midi;
pub mod scenes;
pub mod session;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post, put};
use dmscreen_core::content::{AudioScene, InitiativeTracker, Note, Statblock};
use dmscreen_core::storage::Record;
use serde_json::Value;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::error::ApiError;
use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/scenes", get(scenes::list_scenes).post(scenes::create_scene))
        .route(
            "/api/scenes/{scene_id}",
            get(scenes::get_scene)
                .patch(scenes::update_scene)
                .delete(scenes::delete_scene),
        )
        .route(
            "/api/scenes/{scene_id}/nodes",
            get(scenes::list_nodes).post(scenes::create_node),
        )
        .route(
            "/api/scenes/{scene_id}/nodes/{node_id}",
            patch(scenes::update_node).delete(scenes::delete_node),
        )
        .route("/api/scenes/{scene_id}/nodes/{node_id}/drop", post(scenes::drop_node))
        .route("/api/notes", get(content::list::<Note>).post(content::create::<Note>))
        .route(
            "/api/notes/{id}",
            get(content::get::<Note>)
                .patch(content::update::<Note>)
                .delete(content::delete::<Note>),
        )
        .route(
            "/api/statblocks",
            get(content::list::<Statblock>).post(content::create::<Statblock>),
        )
        .route(
            "/api/statblocks/{id}",
            get(content::get::<Statblock>)
                .patch(content::update::<Statblock>)
                .delete(content::delete::<Statblock>),
        )
        .route(
            "/api/initiative",
            get(content::list::<InitiativeTracker>).post(content::create::<InitiativeTracker>),
        )
        .route(
            "/api/initiative/{id}",
            get(content::get::<InitiativeTracker>)
                .patch(content::update::<InitiativeTracker>)
                .delete(content::delete::<InitiativeTracker>),
        )
        .route(
            "/api/audio-scenes",
            get(content::list::<AudioScene>)
                .post(content::create::<AudioScene>),
        )
        .route(
            "/api/audio-scenes/{id}",
            get(content::get::<AudioScene>)
                .patch(content::update::<AudioScene>)
                .delete(content::delete::<AudioScene>),
        )
        .route("/api/audio", get(content::list_audio).post(content::upload_audio))
        .route(
            "/api/audio/{id}",
            get(content::get_audio).delete(content::delete_audio),
        )
        .route("/api/audio/{id}/file", get(content::audio_file))
        .route(
            "/api/session",
            get(session::get_session).patch(session::update_session),
        )
        .route("/api/session/scene", put(session::switch_scene))
        .route(
            "/api/session/modal",
            post(session::open_modal).delete(session::close_modal),
        )
        .route("/api/session/refresh", post(session::refresh))
        .route(
            "/api/midi/mappings",
            get(midi::list_mappings).post(midi::create_mapping),
        )
        .route(
            "/api/midi/mappings/{id}",
            patch(midi::update_mapping).delete(midi::delete_mapping),
        )
        .route("/api/midi/learn/{id}", post(midi::start_learn))
        .route("/api/midi/learn", delete(midi::cancel_learn))
        .route("/api/midi/messages", post(midi::receive_message))
        .route("/api/midi/commands", get(midi::list_commands))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

/// Apply a partial JSON update to a record.
///
/// Top-level fields of `patch` replace the record's fields. The id is fixed.
pub(crate) fn apply_patch<R: Record>(record: &R, patch: Value) -> Result<R, ApiError> {
    let Value::Object(fields) = patch else {
        return Err(ApiError::BadRequest("Expected a JSON object".to_string()));
    };
    let mut value = serde_json::to_value(record).map_err(|e| ApiError::Internal(e.to_string()))?;
    if let Value::Object(target) = &mut value {
        for (key, field) in fields {
            if key != "id" {
                target.insert(key, field);
            }
        }
    }
    let mut updated: R =
        serde_json::from_value(value).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    updated.touch();
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_apply_patch_keeps_id() {
        let note = Note::new();
        let patched = apply_patch(&note, json!({ "id": "other", "title": "Loot" })).unwrap();
        assert_eq!(patched.id, note.id);
        assert_eq!(patched.title, "Loot");
        assert_eq!(patched.content, note.content);
    }

    #[test]
    fn test_apply_patch_rejects_bad_fields() {
        let note = Note::new();
        let err = apply_patch(&note, json!({ "title": 3 })).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert!(matches!(apply_patch(&note, json!([1, 2])), Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_health() {
        assert_eq!(health().await, StatusCode::OK);
    }
}
