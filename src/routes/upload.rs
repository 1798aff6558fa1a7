use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use crate::error::AppError;
use crate::pipeline::fit::encode_activity;
use crate::routes::{session::require_session, strava::require_strava};
use crate::state::{AppState, BrowserSession, SessionSlot};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/session/:session_id/upload", post(upload))
}

#[derive(Debug, Deserialize, Default)]
struct UploadRequest {
    name: Option<String>,
}

async fn upload(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    payload: Option<Json<UploadRequest>>,
) -> Result<Json<Value>, AppError> {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let session = require_session(&state, &session_id)?;
    if !session.auth.is_logged_in() {
        return Err(AppError::Unauthorized("Connect Strava before uploading".to_string()));
    }

    let name = match request.name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => {
            state.update(&session_id, |session| session.activity_name = name.to_string());
            name.to_string()
        }
        _ => session.activity_name.clone(),
    };

    let _slot = match state.begin_upload(&session_id) {
        Some(SessionSlot::Claimed(guard)) => guard,
        Some(SessionSlot::Busy) => {
            return Err(AppError::Conflict("An upload is already in progress".to_string()));
        }
        None => return Err(AppError::NotFound(session_id)),
    };

    let result = upload_session(&state, &session, &name).await;
    match &result {
        Ok(body) => tracing::info!("Session {} uploaded \"{}\": {}", session_id, name, body),
        Err(err) => tracing::warn!("Session {} upload failed: {}", session_id, err),
    }
    result.map(Json)
}

async fn upload_session(
    state: &AppState,
    session: &BrowserSession,
    name: &str,
) -> Result<Value, AppError> {
    let client = require_strava(state)?;
    let summary = session.form.parameters().summary(state.config().met_strategy);
    let bytes = encode_activity(&summary, &state.encode_options())?;

    let response = session.auth.upload_activity(&client, name, bytes).await?;
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    let Ok(payload) = serde_json::from_str::<Value>(&body) else {
        return Err(AppError::Upstream(format!("{} {}", status, body)));
    };
    if let Some(error) = payload.get("error").filter(|error| !error.is_null()) {
        let message = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(AppError::Upstream(message));
    }
    if !status.is_success() {
        let message = payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| status.to_string());
        return Err(AppError::Upstream(message));
    }

    Ok(payload)
}
