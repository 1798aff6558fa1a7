use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::AppError,
    routes::session::require_session,
    state::{AppState, SessionSlot, SlotGuard},
    strava::{AuthSession, AuthState, StravaClient},
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/session/:session_id/strava/connect", get(connect))
        .route("/api/strava/callback", get(callback))
        .route("/api/session/:session_id/strava/load", post(load))
}

#[derive(Debug, Serialize)]
struct ConnectResponse {
    auth_url: String,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    code: Option<String>,
    state: String,
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct AuthResponse {
    logged_in_name: String,
    auth_state: AuthState,
}

impl From<&AuthSession> for AuthResponse {
    fn from(auth: &AuthSession) -> Self {
        Self {
            logged_in_name: auth.display_name.clone(),
            auth_state: auth.state,
        }
    }
}

/// Only one token exchange runs per session; a second would overwrite the
/// first one's credentials when it finishes.
fn claim_exchange(state: &AppState, session_id: &str) -> Result<SlotGuard, AppError> {
    match state.begin_exchange(session_id) {
        Some(SessionSlot::Claimed(guard)) => Ok(guard),
        Some(SessionSlot::Busy) => Err(AppError::Conflict(
            "A Strava sign-in is already in progress".to_string(),
        )),
        None => Err(AppError::NotFound(session_id.to_string())),
    }
}

pub fn require_strava(state: &AppState) -> Result<StravaClient, AppError> {
    state
        .strava()
        .cloned()
        .ok_or_else(|| AppError::BadRequest("Strava client credentials are not configured".to_string()))
}

async fn connect(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<ConnectResponse>, AppError> {
    require_session(&state, &session_id)?;
    let client = require_strava(&state)?;
    let redirect_uri = state.config().strava_redirect_uri.as_ref().ok_or_else(|| {
        AppError::BadRequest("STRAVA_REDIRECT_URI is not configured".to_string())
    })?;

    let auth_url = client.authorize_url(redirect_uri, &session_id)?;
    Ok(Json(ConnectResponse { auth_url }))
}

async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Json<AuthResponse>, AppError> {
    require_session(&state, &query.state)?;
    let client = require_strava(&state)?;

    if let Some(error) = query.error {
        return Err(AppError::Unauthorized(format!("Strava authorization denied: {}", error)));
    }
    let code = query
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing authorization code".to_string()))?;

    let _exchange = claim_exchange(&state, &query.state)?;
    let mut auth = require_session(&state, &query.state)?.auth;
    auth.on_load(&client, Some(&code)).await;
    let response = AuthResponse::from(&auth);
    state.store_auth(&query.state, auth);

    tracing::info!("Session {} Strava state after code exchange: {:?}", query.state, response.auth_state);
    Ok(Json(response))
}

async fn load(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<AuthResponse>, AppError> {
    require_session(&state, &session_id)?;
    let client = require_strava(&state)?;

    let _exchange = claim_exchange(&state, &session_id)?;
    let mut auth = require_session(&state, &session_id)?.auth;
    auth.on_load(&client, None).await;
    let response = AuthResponse::from(&auth);
    state.store_auth(&session_id, auth);

    Ok(Json(response))
}
