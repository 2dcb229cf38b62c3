//! Prediction Service: validate, encode, classify, shape the response.

use std::{path::Path, sync::Arc};

use thiserror::Error;

use crate::encoder::EncoderBank;
use crate::error::{PredictionError, StartupError, ValidationErrors};
use crate::labels::{
    CongestionLevel, DayOfWeek, Field, PopulationDensity, PublicHoliday, Rainfall, RoadName,
};
use crate::model::{Classifier, FeatureVector, ForestModel};
use crate::types::{
    now_iso8601, ModelInfo, PredictionRequest, PredictionResponse, RawPredictionRequest,
};
use crate::validate::{validate, HOUR_MAX, HOUR_MIN};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("prediction failed: {0}")]
    Prediction(#[from] PredictionError),
}

/// Decoded classifier output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub level: CongestionLevel,
    pub confidence: f64,
}

/// Read-only after construction; share it behind an `Arc`.
pub struct PredictionService {
    encoders: EncoderBank,
    classifier: Arc<dyn Classifier>,
}

impl PredictionService {
    pub fn new(encoders: EncoderBank, classifier: Arc<dyn Classifier>) -> Result<Self, StartupError> {
        let n_targets = encoders.congestion_level.len();
        if classifier.n_classes() != n_targets {
            return Err(StartupError::InvalidModel(format!(
                "classifier has {} classes, target encoder has {}",
                classifier.n_classes(),
                n_targets
            )));
        }
        Ok(Self { encoders, classifier })
    }

    /// Loads both artifacts from disk.
    pub fn load(model_path: &Path, encoders_path: &Path) -> Result<Self, StartupError> {
        let encoders = EncoderBank::load(encoders_path)?;
        let model = ForestModel::load(model_path)?;
        tracing::info!(
            "loaded {} with {} trees; features: {:?}",
            model.algorithm(),
            model.n_trees(),
            model.feature_order().iter().map(|f| f.as_str()).collect::<Vec<_>>()
        );
        Self::new(encoders, Arc::new(model))
    }

    pub fn predict(&self, raw: &RawPredictionRequest) -> Result<PredictionResponse, ServiceError> {
        let req = validate(raw)?;
        let p = self.predict_validated(&req)?;
        Ok(PredictionResponse {
            congestion_level: p.level,
            confidence_score: p.confidence,
            timestamp: now_iso8601(),
        })
    }

    pub fn predict_validated(&self, req: &PredictionRequest) -> Result<Prediction, PredictionError> {
        let x = self.encode(req);
        let scores = self.classifier.predict(&x)?;

        if scores.probabilities.len() != self.classifier.n_classes() {
            return Err(PredictionError::ScoreShape {
                got: scores.probabilities.len(),
                expected: self.classifier.n_classes(),
            });
        }
        let level = self
            .encoders
            .congestion_level
            .decode(scores.class_index)
            .ok_or(PredictionError::UnknownClass(scores.class_index))?;
        let confidence = scores.confidence();
        if !confidence.is_finite() {
            return Err(PredictionError::NonFiniteScore);
        }
        if !(0.0..=1.0).contains(&confidence) {
            return Err(PredictionError::ConfidenceOutOfRange(confidence));
        }

        Ok(Prediction { level, confidence })
    }

    /// Builds the feature vector in the order the classifier was trained with.
    pub fn encode(&self, req: &PredictionRequest) -> FeatureVector {
        let e = &self.encoders;
        FeatureVector(
            self.classifier
                .feature_order()
                .iter()
                .map(|field| match field {
                    Field::Hour => i64::from(req.hour),
                    Field::DayOfWeek => e.day_of_week.encode(req.day_of_week),
                    Field::PublicHoliday => e.public_holiday.encode(req.public_holiday),
                    Field::RoadName => e.road_name.encode(req.road_name),
                    Field::PopulationDensity => e.population_density.encode(req.population_density),
                    Field::Rainfall => e.rainfall.encode(req.rainfall),
                })
                .collect(),
        )
    }

    pub fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_type: self.classifier.algorithm().to_string(),
            expected_features: self.classifier.feature_order().iter().map(|f| f.as_str()).collect(),
            available_categories: self.encoders.categories(),
            hour_range: [HOUR_MIN, HOUR_MAX],
        }
    }

    /// One prediction on a fixed request, run before serving traffic.
    pub fn warmup(&self) -> Result<Prediction, PredictionError> {
        self.predict_validated(&PredictionRequest {
            hour: 8,
            day_of_week: DayOfWeek::Monday,
            public_holiday: PublicHoliday::No,
            road_name: RoadName::Kn1Rd,
            population_density: PopulationDensity::High,
            rainfall: Rainfall::No,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassScores;
    use serde_json::json;
    use std::path::PathBuf;

    fn artifact(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("model").join(name)
    }

    fn shipped() -> PredictionService {
        PredictionService::load(
            &artifact("traffic_model.json"),
            &artifact("label_encoders.json"),
        )
        .unwrap()
    }

    fn shipped_encoders() -> EncoderBank {
        EncoderBank::load(&artifact("label_encoders.json")).unwrap()
    }

    /// Returns fixed scores and records nothing.
    struct Fixed {
        order: Vec<Field>,
        scores: Vec<f64>,
        class_index: usize,
    }

    impl Classifier for Fixed {
        fn algorithm(&self) -> &str {
            "Fixed"
        }
        fn feature_order(&self) -> &[Field] {
            &self.order
        }
        fn n_classes(&self) -> usize {
            4
        }
        fn predict(&self, x: &FeatureVector) -> Result<ClassScores, PredictionError> {
            assert_eq!(x.len(), self.order.len());
            Ok(ClassScores {
                class_index: self.class_index,
                probabilities: self.scores.clone(),
            })
        }
    }

    fn fixed(scores: Vec<f64>, class_index: usize) -> PredictionService {
        let clf = Fixed {
            order: Field::DEFAULT_ORDER.to_vec(),
            scores,
            class_index,
        };
        PredictionService::new(shipped_encoders(), Arc::new(clf)).unwrap()
    }

    fn monday_rush() -> RawPredictionRequest {
        serde_json::from_value(json!({
            "Hour": 8,
            "Day_of_Week": "Monday",
            "Public_Holiday": "No",
            "Road_Name": "KN4",
            "Population_Density": "High",
            "Rainfall": "No Rain"
        }))
        .unwrap()
    }

    #[test]
    fn encodes_in_classifier_order() {
        let svc = shipped();
        let req = validate(&monday_rush()).unwrap();
        // Day_of_Week, Public_Holiday, Road_Name, Population_Density, Rainfall, Hour
        assert_eq!(svc.encode(&req), FeatureVector(vec![1, 0, 4, 0, 0, 8]));

        let svc = fixed(vec![0.1, 0.2, 0.3, 0.4], 3);
        assert_eq!(svc.encode(&req), FeatureVector(vec![8, 1, 0, 4, 0, 0]));
    }

    #[test]
    fn shipped_model_predicts_within_domain() {
        let svc = shipped();
        let out = svc.predict(&monday_rush()).unwrap();
        assert!((0.0..=1.0).contains(&out.confidence_score));
        assert!(chrono::DateTime::parse_from_rfc3339(&out.timestamp).is_ok());
    }

    #[test]
    fn shipped_model_is_deterministic() {
        let svc = shipped();
        let a = svc.predict(&monday_rush()).unwrap();
        let b = svc.predict(&monday_rush()).unwrap();
        assert_eq!(a.congestion_level, b.congestion_level);
        assert_eq!(a.confidence_score, b.confidence_score);
    }

    #[test]
    fn decodes_through_target_encoder() {
        // target classes are sorted: High, Low, Medium, Severe
        let svc = fixed(vec![0.1, 0.7, 0.1, 0.1], 1);
        let p = svc.warmup().unwrap();
        assert_eq!(p.level, CongestionLevel::Low);
        assert!((p.confidence - 0.7).abs() < 1e-12);
    }

    #[test]
    fn validation_failure_never_reaches_classifier() {
        let svc = fixed(vec![0.25; 4], 0);
        let mut raw = monday_rush();
        raw.hour = json!(25);
        match svc.predict(&raw) {
            Err(ServiceError::Validation(e)) => assert!(e.mentions("Hour")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn bad_classifier_output_is_a_prediction_error() {
        let svc = fixed(vec![0.25; 4], 7);
        assert_eq!(svc.warmup().unwrap_err(), PredictionError::UnknownClass(7));

        let svc = fixed(vec![0.5, 0.5], 0);
        assert!(matches!(svc.warmup().unwrap_err(), PredictionError::ScoreShape { .. }));

        let svc = fixed(vec![1.5, 0.0, 0.0, 0.0], 0);
        assert_eq!(svc.warmup().unwrap_err(), PredictionError::ConfidenceOutOfRange(1.5));
    }

    #[test]
    fn rejects_classifier_with_wrong_class_count() {
        struct Binary;
        impl Classifier for Binary {
            fn algorithm(&self) -> &str {
                "Binary"
            }
            fn feature_order(&self) -> &[Field] {
                &Field::DEFAULT_ORDER
            }
            fn n_classes(&self) -> usize {
                2
            }
            fn predict(&self, _: &FeatureVector) -> Result<ClassScores, PredictionError> {
                unreachable!()
            }
        }
        assert!(PredictionService::new(shipped_encoders(), Arc::new(Binary)).is_err());
    }

    #[test]
    fn model_info_matches_validator_domains() {
        let info = shipped().model_info();
        assert_eq!(info.model_type, "RandomForestClassifier");
        assert_eq!(info.expected_features.len(), 6);
        assert_eq!(info.hour_range, [0, 23]);
        let mut days = info.available_categories["Day_of_Week"].clone();
        days.sort();
        let mut expected = crate::labels::labels_of::<DayOfWeek>();
        expected.sort();
        assert_eq!(days, expected);
    }
}
