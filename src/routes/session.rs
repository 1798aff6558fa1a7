use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::state::{AppState, BrowserSession};
use crate::strava::AuthState;
use crate::types::activity::{ActivityEstimate, ActivityParameters};
use crate::types::form::{ActivityForm, FormField, NumericField};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/session", post(create_session))
        .route("/api/session/:session_id", get(get_session))
        .route("/api/session/:session_id/fields/:field", put(update_field))
        .route("/api/session/:session_id/name", put(update_name))
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: String,
    pub fields: ActivityForm,
    pub parameters: ActivityParameters,
    pub estimate: ActivityEstimate,
    pub activity_name: String,
    pub logged_in_name: String,
    pub auth_state: AuthState,
    pub uploading: bool,
}

impl SessionView {
    pub fn new(state: &AppState, session_id: &str, session: &BrowserSession) -> Self {
        let parameters = session.form.parameters();
        Self {
            session_id: session_id.to_string(),
            fields: session.form.clone(),
            parameters,
            estimate: parameters.estimate(state.config().met_strategy),
            activity_name: session.activity_name.clone(),
            logged_in_name: session.auth.display_name.clone(),
            auth_state: session.auth.state,
            uploading: session.uploading,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FieldUpdate {
    text: String,
}

#[derive(Debug, Serialize)]
struct FieldResponse {
    field: FormField,
    unit: &'static str,
    #[serde(flatten)]
    input: NumericField,
    estimate: ActivityEstimate,
}

#[derive(Debug, Deserialize)]
struct NameUpdate {
    name: String,
}

pub fn require_session(state: &AppState, session_id: &str) -> Result<BrowserSession, AppError> {
    state
        .get(session_id)
        .ok_or_else(|| AppError::NotFound(session_id.to_string()))
}

async fn create_session(State(state): State<AppState>) -> Json<SessionView> {
    let session_id = Uuid::new_v4().to_string();
    let session = BrowserSession::default();
    let view = SessionView::new(&state, &session_id, &session);
    state.insert(session_id.clone(), session);

    tracing::info!("Created session {}", session_id);
    Json(view)
}

async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session = require_session(&state, &session_id)?;
    Ok(Json(SessionView::new(&state, &session_id, &session)))
}

async fn update_field(
    State(state): State<AppState>,
    Path((session_id, field_name)): Path<(String, String)>,
    Json(update): Json<FieldUpdate>,
) -> Result<Json<FieldResponse>, AppError> {
    let field = FormField::from_name(&field_name)
        .ok_or_else(|| AppError::BadRequest(format!("Unknown field: {}", field_name)))?;
    let strategy = state.config().met_strategy;

    let (input, parameters) = state
        .update(&session_id, |session| {
            let input = session.form.field_mut(field);
            input.set_text(&update.text);
            (input.clone(), session.form.parameters())
        })
        .ok_or_else(|| AppError::NotFound(session_id.clone()))?;

    if !input.valid {
        tracing::debug!("Rejected {:?} input {:?}, keeping {}", field, input.text, input.value);
    }

    Ok(Json(FieldResponse {
        field,
        unit: field.unit(),
        input,
        estimate: parameters.estimate(strategy),
    }))
}

async fn update_name(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    Json(update): Json<NameUpdate>,
) -> Result<Json<SessionView>, AppError> {
    let name = update.name.trim();
    if name.is_empty() {
        return Err(AppError::BadRequest("Activity name is required".to_string()));
    }

    state
        .update(&session_id, |session| session.activity_name = name.to_string())
        .ok_or_else(|| AppError::NotFound(session_id.clone()))?;
    let session = require_session(&state, &session_id)?;
    Ok(Json(SessionView::new(&state, &session_id, &session)))
}
