use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};

use crate::error::AppError;
use crate::pipeline::fit::encode_activity;
use crate::routes::session::require_session;
use crate::state::AppState;

pub const FIT_CONTENT_TYPE: &str = "application/vnd.ant.fit";

pub fn router() -> Router<AppState> {
    Router::new().route("/api/session/:session_id/export", get(export))
}

async fn export(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let session = require_session(&state, &session_id)?;
    let summary = session.form.parameters().summary(state.config().met_strategy);
    let bytes = encode_activity(&summary, &state.encode_options())?;

    tracing::info!(
        "Exported {} byte activity for session {} ({:.2} km, {:.0} kcal)",
        bytes.len(),
        session_id,
        summary.distance_m / 1000.0,
        summary.calories_kcal
    );

    Ok((
        [
            (header::CONTENT_TYPE, FIT_CONTENT_TYPE),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"activity.fit\""),
        ],
        bytes,
    ))
}
