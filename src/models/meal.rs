use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the meal log.
///
/// `eaten_at_ms` is the capture time of the photo. For meals that went through
/// the offline queue this is the original capture timestamp, not the time the
/// drain finally processed the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MealRecord {
    pub id: i64,
    pub food_name: String,
    pub calories: i64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
    /// Calendar-day label ("YYYY-MM-DD") derived from `eaten_at_ms`.
    pub day: String,
    pub eaten_at_ms: i64,
}

/// Macro-nutrient totals for one day label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NutrientTotals {
    pub calories: i64,
    pub carbs: f64,
    pub protein: f64,
    pub fat: f64,
}

/// Per-day calorie total, used by the weekly summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyCalories {
    pub day: String,
    pub total_calories: i64,
}

/// Derive the aggregation day label from an epoch-millisecond timestamp (UTC).
pub fn day_label(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
        .format("%Y-%m-%d")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_label_is_utc_calendar_date() {
        // 2026-01-15T23:59:59.999Z
        assert_eq!(day_label(1_768_521_599_999), "2026-01-15");
        // one millisecond later rolls the day over
        assert_eq!(day_label(1_768_521_600_000), "2026-01-16");
    }

    #[test]
    fn day_label_tolerates_out_of_range_timestamps() {
        assert_eq!(day_label(i64::MAX), "1970-01-01");
    }
}
