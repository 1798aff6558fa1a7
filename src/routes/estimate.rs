use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::pipeline::estimate::MetStrategy;
use crate::state::AppState;
use crate::types::activity::{ActivityEstimate, ActivityParameters};

pub fn router() -> Router<AppState> {
    Router::new().route("/api/estimate", get(estimate))
}

#[derive(Debug, Deserialize)]
struct EstimateQuery {
    distance_km: f64,
    duration_min: f64,
    incline_percent: f64,
    weight_kg: f64,
    strategy: Option<String>,
}

#[derive(Debug, Serialize)]
struct EstimateResponse {
    parameters: ActivityParameters,
    estimate: ActivityEstimate,
    strategy: MetStrategy,
}

async fn estimate(
    State(state): State<AppState>,
    Query(query): Query<EstimateQuery>,
) -> Result<Json<EstimateResponse>, AppError> {
    let strategy = match query.strategy.as_deref() {
        Some(name) => MetStrategy::from_name(name)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown MET strategy: {}", name)))?,
        None => state.config().met_strategy,
    };

    let parameters = ActivityParameters {
        distance_km: query.distance_km,
        duration_min: query.duration_min,
        incline_percent: query.incline_percent,
        weight_kg: query.weight_kg,
    };

    Ok(Json(EstimateResponse {
        parameters,
        estimate: parameters.estimate(strategy),
        strategy,
    }))
}
