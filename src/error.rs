use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("Activity duration must be positive, got {0}")]
    InvalidDuration(f64),
    #[error("Value {value} does not fit FIT field {field}")]
    OutOfRange { field: &'static str, value: f64 },
    #[error("Field {0} is larger than 255 bytes")]
    FieldTooLarge(u8),
    #[error("Message {0} has more than 255 fields")]
    TooManyFields(u16),
    #[error("FIT has no message number {0}")]
    UnknownMessage(u16),
    #[error("FIT encoder failed: {0}")]
    Writer(String),
    #[error("Could not stage FIT file: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum StravaError {
    #[error("Strava request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Strava returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Invalid Strava response: {0}")]
    InvalidResponse(String),
    #[error("Not connected to Strava")]
    NotLoggedIn,
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Strava(#[from] StravaError),
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Upload rejected by Strava: {0}")]
    Upstream(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Encode(EncodeError::Writer(_) | EncodeError::Io(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            AppError::Encode(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) | AppError::Strava(StravaError::NotLoggedIn) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Strava(_) | AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
