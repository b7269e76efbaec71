//! Food log entries
//!
//! The JSON body the meal log endpoint accepts for one weighed food.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use weighlog_core::Grams;

/// Unit reported with every weight
pub const WEIGHT_UNIT: &str = "g";

/// One weighed food, serialized with camelCase keys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodLogEntry {
    pub food_name: String,
    pub weight: i64,
    pub unit: String,
    pub logged_at: DateTime<Utc>,
}

impl FoodLogEntry {
    pub fn new(food_name: impl Into<String>, weight: Grams, logged_at: DateTime<Utc>) -> Self {
        Self {
            food_name: food_name.into(),
            weight: weight.value(),
            unit: WEIGHT_UNIT.to_string(),
            logged_at,
        }
    }

    /// Entry stamped with the current time
    pub fn now(food_name: impl Into<String>, weight: Grams) -> Self {
        Self::new(food_name, weight, Utc::now())
    }
}
