//! Content records: notes, statblocks, initiative trackers, audio scenes
//! and uploaded audio files.
//!
//! The record handlers are generic over the record type and instantiated
//! per collection in the router.

use std::path::Path as FilePath;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Json, Response};
use dmscreen_core::content::AudioFile;
use dmscreen_core::storage::{Record, delete_record, list_records, load_record, save_record};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::routes::apply_patch;
use crate::state::AppState;

/// Bump the refresh counter so open modules reload their content.
async fn refresh(state: &AppState) -> u64 {
    state.session.lock().await.trigger_refresh()
}

/// `GET /api/<collection>`
pub async fn list<R>(State(state): State<AppState>) -> Result<Json<Vec<R>>, ApiError>
where
    R: Record + Default + Sync + 'static,
{
    Ok(Json(list_records(state.storage.as_ref()).await?))
}

/// `POST /api/<collection>`: create a record from defaults, overlaid with
/// the fields of an optional JSON body.
pub async fn create<R>(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<R>), ApiError>
where
    R: Record + Default + Sync + 'static,
{
    let mut record = R::default();
    if !body.is_empty() {
        let fields: Value =
            serde_json::from_slice(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
        record = apply_patch(&record, fields)?;
    }
    save_record(state.storage.as_ref(), &record).await?;
    tracing::info!(collection = %R::COLLECTION, id = record.record_id(), "created record");
    Ok((StatusCode::CREATED, Json(record)))
}

/// `GET /api/<collection>/{id}`
pub async fn get<R>(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<R>, ApiError>
where
    R: Record + Default + Sync + 'static,
{
    Ok(Json(load_record(state.storage.as_ref(), &id).await?))
}

/// `PATCH /api/<collection>/{id}`
pub async fn update<R>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> Result<Json<R>, ApiError>
where
    R: Record + Default + Sync + 'static,
{
    let record: R = load_record(state.storage.as_ref(), &id).await?;
    let record = apply_patch(&record, patch)?;
    save_record(state.storage.as_ref(), &record).await?;
    refresh(&state).await;
    Ok(Json(record))
}

/// `DELETE /api/<collection>/{id}`
pub async fn delete<R>(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError>
where
    R: Record + Default + Sync + 'static,
{
    if !state.storage.exists(R::COLLECTION, &id).await? {
        return Err(ApiError::NotFound(format!("Not found: {}/{id}", R::COLLECTION)));
    }
    delete_record::<_, R>(state.storage.as_ref(), &id).await?;
    refresh(&state).await;
    tracing::info!(collection = %R::COLLECTION, %id, "deleted record");
    Ok(StatusCode::NO_CONTENT)
}

// --- Audio files ---

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub name: String,
}

/// `GET /api/audio`
pub async fn list_audio(State(state): State<AppState>) -> Result<Json<Vec<AudioFile>>, ApiError> {
    let mut files: Vec<AudioFile> = list_records(state.storage.as_ref()).await?;
    files.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    Ok(Json(files))
}

/// `POST /api/audio?name=<original file name>` with the raw file as body.
pub async fn upload_audio(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<(StatusCode, Json<AudioFile>), ApiError> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("No file uploaded".to_string()));
    }
    let file = AudioFile::from_upload(&params.name);
    state.storage.write_blob(&file.filename, body.to_vec()).await?;
    save_record(state.storage.as_ref(), &file).await?;
    tracing::info!(id = %file.id, bytes = body.len(), "uploaded audio");
    Ok((StatusCode::CREATED, Json(file)))
}

/// `GET /api/audio/{id}`
pub async fn get_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<AudioFile>, ApiError> {
    Ok(Json(load_record(state.storage.as_ref(), &id).await?))
}

/// `DELETE /api/audio/{id}`: removes the metadata and the stored file.
pub async fn delete_audio(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let file: AudioFile = load_record(state.storage.as_ref(), &id).await?;
    state.storage.delete_blob(&file.filename).await?;
    delete_record::<_, AudioFile>(state.storage.as_ref(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/audio/{id}/file`: the uploaded bytes.
pub async fn audio_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let file: AudioFile = load_record(state.storage.as_ref(), &id).await?;
    let bytes = state.storage.read_blob(&file.filename).await?;
    Ok(([(CONTENT_TYPE, content_type(&file.filename))], bytes).into_response())
}

fn content_type(filename: &str) -> &'static str {
    let extension = FilePath::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("mp3") => "audio/mpeg",
        Some("wav") => "audio/wav",
        Some("ogg") => "audio/ogg",
        Some("flac") => "audio/flac",
        Some("m4a") => "audio/mp4",
        Some("webm") => "audio/webm",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_state;
    use dmscreen_core::content::{InitiativeTracker, Note, Statblock};
    use serde_json::json;

    #[tokio::test]
    async fn test_note_lifecycle() {
        let state = test_state().await;
        let (status, Json(note)) = create::<Note>(
            State(state.clone()),
            Bytes::from_static(br#"{"title":"Rumours"}"#),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(note.title, "Rumours");

        let Json(updated) = update::<Note>(
            State(state.clone()),
            Path(note.id.clone()),
            Json(json!({ "content": "The mayor is a doppelganger" })),
        )
        .await
        .unwrap();
        assert_eq!(updated.title, "Rumours");
        assert_eq!(updated.content, "The mayor is a doppelganger");
        assert_eq!(state.session.lock().await.store().refresh_counter(), 1);

        let Json(all) = list::<Note>(State(state.clone())).await.unwrap();
        assert_eq!(all.len(), 1);

        let status = delete::<Note>(State(state.clone()), Path(note.id.clone()))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let err = get::<Note>(State(state), Path(note.id)).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_without_body_uses_defaults() {
        let state = test_state().await;
        let (_, Json(statblock)) = create::<Statblock>(State(state), Bytes::new()).await.unwrap();
        assert_eq!(statblock.armor_class, 10);
        assert_eq!(statblock.hit_dice, "2d8");
    }

    #[tokio::test]
    async fn test_delete_missing_record() {
        let state = test_state().await;
        let err = delete::<InitiativeTracker>(State(state), Path("nope".to_string()))
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_audio_upload_and_download() {
        let state = test_state().await;
        let (status, Json(file)) = upload_audio(
            State(state.clone()),
            Query(UploadParams {
                name: "Tavern Ambience.mp3".to_string(),
            }),
            Bytes::from_static(b"ID3 fake"),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(file.name, "Tavern Ambience");
        assert!(file.filename.ends_with(".mp3"));

        let response = audio_file(State(state.clone()), Path(file.id.clone()))
            .await
            .unwrap();
        assert_eq!(response.headers()[CONTENT_TYPE], "audio/mpeg");

        delete_audio(State(state.clone()), Path(file.id.clone()))
            .await
            .unwrap();
        assert!(state.storage.read_blob(&file.filename).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_upload_is_rejected() {
        let state = test_state().await;
        let err = upload_audio(
            State(state),
            Query(UploadParams {
                name: "x.wav".to_string(),
            }),
            Bytes::new(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a.MP3"), "audio/mpeg");
        assert_eq!(content_type("a.ogg"), "audio/ogg");
        assert_eq!(content_type("noext"), "application/octet-stream");
    }
}
