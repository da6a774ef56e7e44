use garde::Validate;
use serde::{Deserialize, Serialize};

use crate::models::meal::MealRecord;

/// Structured nutrition estimate extracted from a meal photo by a cloud
/// provider. Fields the model omits fall back to zero, mirroring the
/// providers' habit of dropping macros they are unsure about.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FoodInfo {
    #[garde(length(min = 1, max = 200))]
    pub food_name: String,

    #[garde(range(min = 0, max = 10_000))]
    #[serde(default)]
    pub calories: i64,

    #[garde(range(min = 0.0, max = 1_000.0))]
    #[serde(default)]
    pub carbs: f64,

    #[garde(range(min = 0.0, max = 1_000.0))]
    #[serde(default)]
    pub protein: f64,

    #[garde(range(min = 0.0, max = 1_000.0))]
    #[serde(default)]
    pub fat: f64,
}

/// Outcome of an interactive analyze call.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AnalyzeOutcome {
    /// Analyzed online and logged immediately.
    Analyzed { meal: MealRecord },
    /// No usable network; the request was queued for deferred analysis.
    Queued { request_id: i64, message: String },
}
