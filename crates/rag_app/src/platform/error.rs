use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rag_logging::rag_error;
use serde_json::json;

use super::session::SessionError;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("failed to render page: {0}")]
    Render(#[from] askama::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Session(SessionError::Unknown(_)) => StatusCode::NOT_FOUND,
            ApiError::Render(_) => {
                rag_error!("{}", self);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
