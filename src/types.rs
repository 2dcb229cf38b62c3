use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::encoder::Categories;
use crate::error::FieldViolation;
use crate::labels::{
    CongestionLevel, DayOfWeek, PopulationDensity, PublicHoliday, Rainfall, RoadName,
};

// ---------- Request ----------

/// Prediction body as received. Fields stay untyped until validation so a
/// wrong type or a missing key is reported against the field it concerns.
/// Only a JSON object deserializes into it; arrays and scalars are rejected.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RawPredictionRequest {
    #[serde(rename = "Hour")]
    pub hour: Value,
    #[serde(rename = "Day_of_Week")]
    pub day_of_week: Value,
    #[serde(rename = "Public_Holiday")]
    pub public_holiday: Value,
    #[serde(rename = "Road_Name")]
    pub road_name: Value,
    #[serde(rename = "Population_Density")]
    pub population_density: Value,
    #[serde(rename = "Rainfall")]
    pub rainfall: Value,
}

impl RawPredictionRequest {
    /// Missing keys become `null`; unknown keys are dropped.
    pub fn from_map(mut map: Map<String, Value>) -> Self {
        let mut take = |key: &str| map.remove(key).unwrap_or(Value::Null);
        Self {
            hour: take("Hour"),
            day_of_week: take("Day_of_Week"),
            public_holiday: take("Public_Holiday"),
            road_name: take("Road_Name"),
            population_density: take("Population_Density"),
            rainfall: take("Rainfall"),
        }
    }
}

impl<'de> Deserialize<'de> for RawPredictionRequest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Map::deserialize(deserializer).map(Self::from_map)
    }
}

/// A request whose every field is inside its trained domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PredictionRequest {
    pub hour: u8,
    pub day_of_week: DayOfWeek,
    pub public_holiday: PublicHoliday,
    pub road_name: RoadName,
    pub population_density: PopulationDensity,
    pub rainfall: Rainfall,
}

// ---------- Responses ----------

#[derive(Debug, Clone, Serialize)]
pub struct PredictionResponse {
    #[serde(rename = "Congestion_Level")]
    pub congestion_level: CongestionLevel,
    pub confidence_score: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub timestamp: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub expected_features: Vec<&'static str>,
    pub available_categories: Categories,
    pub hour_range: [u8; 2],
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub violations: Vec<FieldViolation>,
}

/// Current time as an RFC 3339 timestamp.
pub fn now_iso8601() -> String {
    chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn raw_request_reads_named_keys_only() {
        let raw: RawPredictionRequest =
            serde_json::from_value(json!({"Hour": 8, "Road_Name": "KN4", "Extra": 1})).unwrap();
        assert_eq!(raw.hour, json!(8));
        assert_eq!(raw.road_name, json!("KN4"));
        assert_eq!(raw.rainfall, Value::Null);
    }

    #[test]
    fn raw_request_rejects_non_objects() {
        for body in [
            json!([8, "Monday", "No", "KN4", "High", "No"]),
            json!([1, 2]),
            json!(8),
            json!("Monday"),
            Value::Null,
        ] {
            assert!(
                serde_json::from_value::<RawPredictionRequest>(body.clone()).is_err(),
                "{body} should not deserialize"
            );
        }
    }
}
