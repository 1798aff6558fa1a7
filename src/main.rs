use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use treadsim_rs::{app, config::Config, state::AppState};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "treadsim_rs=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    if config.strava_client_id.is_none() || config.strava_client_secret.is_none() {
        tracing::warn!("STRAVA_CLIENT_ID/STRAVA_CLIENT_SECRET not set; uploads are disabled");
    }
    let state = AppState::new(config.clone());

    // Session eviction
    let eviction_state = state.clone();
    let eviction_ttl = config.session_ttl;
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(300)).await;
            eviction_state.evict_expired(eviction_ttl);
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("Failed to bind {}: {}", addr, err);
            std::process::exit(1);
        }
    };

    tracing::info!("treadsim-rs listening on {}", addr);
    tracing::info!("Health check: http://{}/health", addr);
    tracing::info!("New session: POST http://{}/api/session", addr);
    tracing::info!("Estimate: GET http://{}/api/estimate", addr);

    if let Err(err) = axum::serve(listener, app(state)).await {
        tracing::error!("Server error: {}", err);
    }
}
