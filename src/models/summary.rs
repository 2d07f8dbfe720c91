use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Per-day rollup of battery and outside temperature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailySummary {
    pub day: NaiveDate,
    pub avg_battery_level: Option<f64>,
    pub min_battery_level: Option<f64>,
    pub max_battery_level: Option<f64>,
    pub avg_outside_temp: Option<f64>,
    pub data_points: i64,
}
