use std::time::Duration;

use crate::pipeline::estimate::MetStrategy;
use crate::pipeline::fit::activity::DEFAULT_SAMPLE_STEP_SECONDS;

pub const DEFAULT_STRAVA_BASE_URL: &str = "https://www.strava.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub session_ttl: Duration,
    pub strava_base_url: String,
    pub strava_client_id: Option<String>,
    pub strava_client_secret: Option<String>,
    pub strava_redirect_uri: Option<String>,
    pub sample_step_seconds: f64,
    pub met_strategy: MetStrategy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            session_ttl: Duration::from_secs(3600),
            strava_base_url: DEFAULT_STRAVA_BASE_URL.to_string(),
            strava_client_id: None,
            strava_client_secret: None,
            strava_redirect_uri: None,
            sample_step_seconds: DEFAULT_SAMPLE_STEP_SECONDS,
            met_strategy: MetStrategy::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let port = std::env::var("PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.port);

        let session_ttl = std::env::var("SESSION_TTL_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.session_ttl);

        let sample_step_seconds = std::env::var("SAMPLE_STEP_SECONDS")
            .ok()
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|step| step.is_finite() && *step > 0.0)
            .unwrap_or(defaults.sample_step_seconds);

        let met_strategy = std::env::var("MET_STRATEGY")
            .ok()
            .and_then(|s| MetStrategy::from_name(&s))
            .unwrap_or(defaults.met_strategy);

        Self {
            port,
            session_ttl,
            strava_base_url: non_empty_env("STRAVA_BASE_URL").unwrap_or(defaults.strava_base_url),
            strava_client_id: non_empty_env("STRAVA_CLIENT_ID"),
            strava_client_secret: non_empty_env("STRAVA_CLIENT_SECRET"),
            strava_redirect_uri: non_empty_env("STRAVA_REDIRECT_URI"),
            sample_step_seconds,
            met_strategy,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
