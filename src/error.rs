use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::{models::FieldErrors, session::SubmitError};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("session {0} not found")] SessionNotFound(Uuid),
    #[error("some fields are invalid")] Validation(FieldErrors),
    #[error("a generation is already running or cooling down")] Busy,
    #[error("no avatar has been generated yet")] NoImage,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::SessionNotFound(_) | ApiError::NoImage => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Busy => StatusCode::CONFLICT,
        }
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Invalid(fields) => ApiError::Validation(fields),
            SubmitError::Busy => ApiError::Busy,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
