use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// One violated constraint on one request field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub constraint: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, constraint: impl Into<String>) -> Self {
        Self {
            field,
            constraint: constraint.into(),
        }
    }
}

/// Every field of a request that failed validation, in field order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid request: {}", summarize(.0))]
pub struct ValidationErrors(pub Vec<FieldViolation>);

impl ValidationErrors {
    pub fn violations(&self) -> &[FieldViolation] {
        &self.0
    }

    pub fn mentions(&self, field: &str) -> bool {
        self.0.iter().any(|v| v.field == field)
    }
}

fn summarize(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{} {}", v.field, v.constraint))
        .collect::<Vec<_>>()
        .join("; ")
}

/// The classifier failed or produced something the service cannot use.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PredictionError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    FeatureLength { got: usize, expected: usize },
    #[error("classifier returned {got} class scores, expected {expected}")]
    ScoreShape { got: usize, expected: usize },
    #[error("classifier returned class index {0} outside the target encoder")]
    UnknownClass(usize),
    #[error("classifier produced a non-finite score")]
    NonFiniteScore,
    #[error("confidence {0} outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Artifacts could not be loaded or do not agree with each other.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("malformed model JSON")]
    Json(#[source] serde_json::Error),
    #[error("encoder artifact has no entry for {0}")]
    MissingEncoder(&'static str),
    #[error("encoder for {field} knows label {label:?} which requests cannot carry")]
    UnknownLabel { field: &'static str, label: String },
    #[error("encoder for {field} lists label {label:?} twice")]
    DuplicateLabel { field: &'static str, label: String },
    #[error("encoder for {field} has no code for label {label:?}")]
    MissingLabel { field: &'static str, label: &'static str },
    #[error("invalid model artifact: {0}")]
    InvalidModel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_lists_each_field() {
        let err = ValidationErrors(vec![
            FieldViolation::new("Hour", "must be between 0 and 23"),
            FieldViolation::new("Road_Name", "field required"),
        ]);
        assert_eq!(
            err.to_string(),
            "invalid request: Hour must be between 0 and 23; Road_Name field required"
        );
        assert!(err.mentions("Hour"));
        assert!(!err.mentions("Rainfall"));
    }
}
