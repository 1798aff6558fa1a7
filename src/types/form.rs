use serde::{Deserialize, Serialize};

use crate::types::activity::ActivityParameters;

/// A numeric text input that keeps its last valid value while the user is
/// typing something that does not parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericField {
    pub text: String,
    pub value: f64,
    pub valid: bool,
}

impl NumericField {
    pub fn new(value: f64) -> Self {
        Self {
            text: value.to_string(),
            value,
            valid: true,
        }
    }

    /// Applies a keystroke. Returns the new value when the text parsed.
    pub fn set_text(&mut self, text: &str) -> Option<f64> {
        self.text = text.to_string();
        let parsed = text
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite());
        self.valid = parsed.is_some();
        if let Some(value) = parsed {
            self.value = value;
        }
        parsed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormField {
    Distance,
    Duration,
    Incline,
    Weight,
}

impl FormField {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "distance" => Some(Self::Distance),
            "duration" => Some(Self::Duration),
            "incline" => Some(Self::Incline),
            "weight" => Some(Self::Weight),
            _ => None,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Self::Distance => "km",
            Self::Duration => "min",
            Self::Incline => "%",
            Self::Weight => "kg",
        }
    }
}

/// The four inputs of the activity form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityForm {
    pub distance: NumericField,
    pub duration: NumericField,
    pub incline: NumericField,
    pub weight: NumericField,
}

impl Default for ActivityForm {
    fn default() -> Self {
        Self::from_parameters(&ActivityParameters::default())
    }
}

impl ActivityForm {
    pub fn from_parameters(params: &ActivityParameters) -> Self {
        Self {
            distance: NumericField::new(params.distance_km),
            duration: NumericField::new(params.duration_min),
            incline: NumericField::new(params.incline_percent),
            weight: NumericField::new(params.weight_kg),
        }
    }

    pub fn field_mut(&mut self, field: FormField) -> &mut NumericField {
        match field {
            FormField::Distance => &mut self.distance,
            FormField::Duration => &mut self.duration,
            FormField::Incline => &mut self.incline,
            FormField::Weight => &mut self.weight,
        }
    }

    /// Last valid values of every field.
    pub fn parameters(&self) -> ActivityParameters {
        ActivityParameters {
            distance_km: self.distance.value,
            duration_min: self.duration.value,
            incline_percent: self.incline.value,
            weight_kg: self.weight.value,
        }
    }
}
