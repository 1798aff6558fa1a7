//! Altitude and energy estimates for a treadmill session.
//!
//! Both functions are garbage-in/garbage-out: nothing is validated, and a
//! zero duration produces a non-finite speed. Callers guard their inputs.

use serde::{Deserialize, Serialize};

/// Speed above which the session counts as running.
const RUNNING_SPEED_KMH: f64 = 8.0;
const STEEP_INCLINE_PERCENT: f64 = 10.0;

/// Base METs by average speed (km/h), used by [`MetStrategy::InclineScaled`].
///
/// Walking and running entries of the Compendium of Physical Activities
/// (Ainsworth et al., 2011) at 2, 3, 4, 5, 6 and 7 mph; 7.5 mph and above
/// uses the fastest entry.
const SPEED_MET_TIERS: [(f64, f64); 6] = [
    (3.2, 2.8),
    (4.8, 3.5),
    (6.4, 5.0),
    (8.0, 8.3),
    (9.7, 9.8),
    (11.3, 11.0),
];
const FASTEST_TIER_MET: f64 = 11.8;

/// Which MET lookup converts speed and incline into an energy rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetStrategy {
    /// Four fixed METs picked by a steep-incline cutoff and a running cutoff.
    #[default]
    SteepThreshold,
    /// Speed-tiered MET scaled by `1 + incline / 10`.
    InclineScaled,
}

impl MetStrategy {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "steep-threshold" | "steep_threshold" => Some(Self::SteepThreshold),
            "incline-scaled" | "incline_scaled" => Some(Self::InclineScaled),
            _ => None,
        }
    }

    pub fn met(self, speed_kmh: f64, incline_percent: f64) -> f64 {
        match self {
            Self::SteepThreshold => {
                let running = speed_kmh > RUNNING_SPEED_KMH;
                match (incline_percent >= STEEP_INCLINE_PERCENT, running) {
                    (true, true) => 11.5,
                    (true, false) => 9.0,
                    (false, true) => 9.8,
                    (false, false) => 5.0,
                }
            }
            Self::InclineScaled => {
                let base = SPEED_MET_TIERS
                    .iter()
                    .find(|(limit, _)| speed_kmh <= *limit)
                    .map(|(_, met)| *met)
                    .unwrap_or(FASTEST_TIER_MET);
                // Steep descents would otherwise flip the sign of the estimate.
                base * (1.0 + incline_percent / 10.0).max(0.0)
            }
        }
    }
}

/// Height climbed in meters when covering `distance_km` at a constant grade.
pub fn altitude_gain(incline_percent: f64, distance_km: f64) -> f64 {
    let distance_m = distance_km * 1000.0;
    distance_m * (incline_percent / 100.0)
}

/// Estimated kilocalories: hours × MET × body weight.
pub fn calories_burned(
    duration_min: f64,
    incline_percent: f64,
    distance_km: f64,
    weight_kg: f64,
    strategy: MetStrategy,
) -> f64 {
    let duration_h = duration_min / 60.0;
    let speed_kmh = distance_km / duration_h;
    duration_h * strategy.met(speed_kmh, incline_percent) * weight_kg
}
