//! Request Validator: structural and domain checks ahead of encoding.

use serde_json::Value;

use crate::error::{FieldViolation, ValidationErrors};
use crate::labels::{labels_of, Label};
use crate::types::{PredictionRequest, RawPredictionRequest};

pub const HOUR_FIELD: &str = "Hour";
pub const HOUR_MIN: u8 = 0;
pub const HOUR_MAX: u8 = 23;

/// Checks every field and returns the typed request, or every violation found.
pub fn validate(raw: &RawPredictionRequest) -> Result<PredictionRequest, ValidationErrors> {
    let mut violations = Vec::new();

    let hour = check_hour(&raw.hour, &mut violations);
    let day_of_week = check_label(&raw.day_of_week, &mut violations);
    let public_holiday = check_label(&raw.public_holiday, &mut violations);
    let road_name = check_label(&raw.road_name, &mut violations);
    let population_density = check_label(&raw.population_density, &mut violations);
    let rainfall = check_label(&raw.rainfall, &mut violations);

    match (hour, day_of_week, public_holiday, road_name, population_density, rainfall) {
        (
            Some(hour),
            Some(day_of_week),
            Some(public_holiday),
            Some(road_name),
            Some(population_density),
            Some(rainfall),
        ) => Ok(PredictionRequest {
            hour,
            day_of_week,
            public_holiday,
            road_name,
            population_density,
            rainfall,
        }),
        _ => Err(ValidationErrors(violations)),
    }
}

fn check_hour(value: &Value, violations: &mut Vec<FieldViolation>) -> Option<u8> {
    let n = match value {
        Value::Null => {
            violations.push(FieldViolation::new(HOUR_FIELD, "field required"));
            return None;
        }
        Value::Number(n) => n,
        _ => {
            violations.push(FieldViolation::new(HOUR_FIELD, "must be an integer"));
            return None;
        }
    };

    // 8.0 counts as an integer, 8.5 does not
    let hour = n
        .as_i64()
        .map(i128::from)
        .or_else(|| n.as_u64().map(i128::from))
        .or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.abs() < 1e18)
                .map(|f| f as i128)
        });

    match hour {
        Some(h) if (HOUR_MIN as i128..=HOUR_MAX as i128).contains(&h) => Some(h as u8),
        Some(_) => {
            violations.push(FieldViolation::new(
                HOUR_FIELD,
                format!("must be between {HOUR_MIN} and {HOUR_MAX}"),
            ));
            None
        }
        None => {
            violations.push(FieldViolation::new(HOUR_FIELD, "must be an integer"));
            None
        }
    }
}

fn check_label<L: Label>(value: &Value, violations: &mut Vec<FieldViolation>) -> Option<L> {
    match value {
        Value::Null => {
            violations.push(FieldViolation::new(L::FIELD, "field required"));
            None
        }
        Value::String(s) => {
            let label = L::from_label(s);
            if label.is_none() {
                violations.push(FieldViolation::new(
                    L::FIELD,
                    format!("must be one of [{}]", labels_of::<L>().join(", ")),
                ));
            }
            label
        }
        _ => {
            violations.push(FieldViolation::new(L::FIELD, "must be a string"));
            None
        }
    }
}
