use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use rusty_charting::ChartingError;
use serde_json::json;

/// Error type for API responses.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Internal(String),
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not_found: {msg}"),
            Self::BadRequest(msg) => write!(f, "bad_request: {msg}"),
            Self::Internal(msg) => write!(f, "internal_error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };
        (status, axum::Json(json!({ "error": msg }))).into_response()
    }
}

impl From<ChartingError> for ApiError {
    fn from(e: ChartingError) -> Self {
        match e {
            ChartingError::UnknownSymbol(_) => Self::NotFound(e.to_string()),
            ChartingError::MalformedInput(_)
            | ChartingError::Range { .. }
            | ChartingError::EmptyInput
            | ChartingError::MissingField(_)
            | ChartingError::Overlap { .. } => Self::BadRequest(e.to_string()),
            ChartingError::InternalConsistency(_) | ChartingError::Io(_) | ChartingError::Csv(_) => {
                Self::Internal(e.to_string())
            }
        }
    }
}
