pub mod estimate;
pub mod export;
pub mod health;
pub mod session;
pub mod strava;
pub mod upload;
