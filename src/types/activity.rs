use serde::{Deserialize, Serialize};

use crate::pipeline::estimate::{altitude_gain, calories_burned, MetStrategy};

/// The four form inputs describing one treadmill session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityParameters {
    pub distance_km: f64,
    pub duration_min: f64,
    pub incline_percent: f64,
    pub weight_kg: f64,
}

impl Default for ActivityParameters {
    fn default() -> Self {
        Self {
            distance_km: 2.6,
            duration_min: 30.0,
            incline_percent: 13.37,
            weight_kg: 72.0,
        }
    }
}

impl ActivityParameters {
    pub fn estimate(&self, strategy: MetStrategy) -> ActivityEstimate {
        ActivityEstimate {
            altitude_gain_m: altitude_gain(self.incline_percent, self.distance_km),
            calories_burned_kcal: calories_burned(
                self.duration_min,
                self.incline_percent,
                self.distance_km,
                self.weight_kg,
                strategy,
            ),
        }
    }

    /// Totals in the units the activity file is written in.
    pub fn summary(&self, strategy: MetStrategy) -> ActivitySummary {
        let estimate = self.estimate(strategy);
        ActivitySummary {
            distance_m: self.distance_km * 1000.0,
            altitude_gain_m: estimate.altitude_gain_m,
            calories_kcal: estimate.calories_burned_kcal,
            duration_s: self.duration_min * 60.0,
            weight_kg: Some(self.weight_kg),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivityEstimate {
    pub altitude_gain_m: f64,
    pub calories_burned_kcal: f64,
}

/// Totals handed to the activity encoder.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivitySummary {
    pub distance_m: f64,
    pub altitude_gain_m: f64,
    pub calories_kcal: f64,
    pub duration_s: f64,
    pub weight_kg: Option<f64>,
}
