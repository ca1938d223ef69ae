//! API error type and its HTTP mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dmscreen_core::StorageError;
use dmscreen_core::midi::MidiError;
use dmscreen_core::session::SessionError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(id) => ApiError::NotFound(format!("Not found: {id}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::UnknownNode(_) | SessionError::UnknownScene(_) => {
                ApiError::NotFound(err.to_string())
            }
            SessionError::LastScene => ApiError::Conflict(err.to_string()),
            SessionError::KindMismatch { .. } | SessionError::InvalidViewport => {
                ApiError::BadRequest(err.to_string())
            }
            SessionError::Storage(e) => e.into(),
        }
    }
}

impl From<MidiError> for ApiError {
    fn from(err: MidiError) -> Self {
        match err {
            MidiError::UnknownMapping(_) => ApiError::NotFound(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_errors_map_to_status() {
        let not_found: ApiError = SessionError::UnknownNode("n1".into()).into();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let conflict: ApiError = SessionError::LastScene.into();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let storage: ApiError = SessionError::Storage(StorageError::Io("disk".into())).into();
        assert_eq!(storage.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_storage_not_found_is_404() {
        let err: ApiError = StorageError::NotFound("notes/x".into()).into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Not found: notes/x");
    }
}
