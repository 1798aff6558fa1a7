pub mod config;
pub mod error;
pub mod pipeline;
pub mod routes;
pub mod state;
pub mod strava;
pub mod types;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Full application router with every route mounted.
pub fn app(state: state::AppState) -> Router {
    Router::new()
        .merge(routes::health::router())
        .merge(routes::estimate::router())
        .merge(routes::session::router())
        .merge(routes::export::router())
        .merge(routes::strava::router())
        .merge(routes::upload::router())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
