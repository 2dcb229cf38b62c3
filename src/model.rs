use serde::Deserialize;
use std::{fs, path::Path};

use crate::error::{PredictionError, StartupError};
use crate::labels::Field;

/// Encoded request, one integer per input field in classifier order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureVector(pub Vec<i64>);

impl FeatureVector {
    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }
}

/// Raw classifier output: winning class index plus per-class probabilities.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassScores {
    pub class_index: usize,
    pub probabilities: Vec<f64>,
}

impl ClassScores {
    /// Picks the first class with the highest probability.
    pub fn from_probabilities(probabilities: Vec<f64>) -> Result<Self, PredictionError> {
        if probabilities.iter().any(|p| !p.is_finite()) {
            return Err(PredictionError::NonFiniteScore);
        }
        let mut class_index = 0;
        for (i, p) in probabilities.iter().enumerate() {
            if *p > probabilities[class_index] {
                class_index = i;
            }
        }
        Ok(Self {
            class_index,
            probabilities,
        })
    }

    pub fn confidence(&self) -> f64 {
        self.probabilities
            .get(self.class_index)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Decision function over encoded feature vectors. Implementations are
/// read-only after construction and shared across request handlers.
pub trait Classifier: Send + Sync {
    fn algorithm(&self) -> &str;
    /// Input fields in the order `predict` expects them.
    fn feature_order(&self) -> &[Field];
    fn n_classes(&self) -> usize;
    fn predict(&self, x: &FeatureVector) -> Result<ClassScores, PredictionError>;
}

// ---------- Artifact format ----------

#[derive(Deserialize)]
struct ModelJson {
    algorithm: String,
    feature_names: Option<Vec<String>>,
    n_classes: usize,
    trees: Vec<TreeJson>,
}

#[derive(Deserialize)]
struct TreeJson {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: Vec<f64>,
    },
}

// ---------- Tree ensemble ----------

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>, // leaf values normalised to probabilities
}

impl Tree {
    /// Walks from the root; `x[feature] <= threshold` goes left.
    fn leaf(&self, x: &[i64]) -> &[f64] {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if (x[*feature] as f64) <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { value } => return value,
            }
        }
    }
}

/// Ensemble of decision trees. Class probabilities are the mean of each
/// tree's normalised leaf weights.
#[derive(Debug, Clone)]
pub struct ForestModel {
    algorithm: String,
    feature_order: Vec<Field>,
    n_classes: usize,
    trees: Vec<Tree>,
}

impl ForestModel {
    pub fn load(model_path: &Path) -> Result<Self, StartupError> {
        let txt = fs::read_to_string(model_path).map_err(|source| StartupError::Read {
            path: model_path.to_path_buf(),
            source,
        })?;
        let meta: ModelJson = serde_json::from_str(&txt).map_err(|source| StartupError::Parse {
            path: model_path.to_path_buf(),
            source,
        })?;
        Self::from_meta(meta)
    }

    pub fn from_json_str(txt: &str) -> Result<Self, StartupError> {
        let meta: ModelJson = serde_json::from_str(txt).map_err(StartupError::Json)?;
        Self::from_meta(meta)
    }

    fn from_meta(meta: ModelJson) -> Result<Self, StartupError> {
        let feature_order = match meta.feature_names {
            Some(names) => parse_feature_order(&names)?,
            None => Field::DEFAULT_ORDER.to_vec(),
        };
        if meta.n_classes == 0 {
            return Err(invalid("n_classes must be positive"));
        }
        if meta.trees.is_empty() {
            return Err(invalid("model has no trees"));
        }

        let trees = meta
            .trees
            .into_iter()
            .enumerate()
            .map(|(t, tree)| check_tree(t, tree.nodes, feature_order.len(), meta.n_classes))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            algorithm: meta.algorithm,
            feature_order,
            n_classes: meta.n_classes,
            trees,
        })
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for ForestModel {
    fn algorithm(&self) -> &str {
        &self.algorithm
    }

    fn feature_order(&self) -> &[Field] {
        &self.feature_order
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, x: &FeatureVector) -> Result<ClassScores, PredictionError> {
        if x.len() != self.feature_order.len() {
            return Err(PredictionError::FeatureLength {
                got: x.len(),
                expected: self.feature_order.len(),
            });
        }

        let mut probs = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (acc, p) in probs.iter_mut().zip(tree.leaf(x.as_slice())) {
                *acc += p;
            }
        }
        let n = self.trees.len() as f64;
        probs.iter_mut().for_each(|p| *p /= n);

        ClassScores::from_probabilities(probs)
    }
}

fn invalid(msg: impl Into<String>) -> StartupError {
    StartupError::InvalidModel(msg.into())
}

fn parse_feature_order(names: &[String]) -> Result<Vec<Field>, StartupError> {
    let mut order = Vec::with_capacity(names.len());
    for name in names {
        let field = Field::from_name(name)
            .ok_or_else(|| invalid(format!("unknown feature {name:?}")))?;
        if order.contains(&field) {
            return Err(invalid(format!("feature {name:?} listed twice")));
        }
        order.push(field);
    }
    if order.len() != Field::DEFAULT_ORDER.len() {
        return Err(invalid(format!(
            "model expects {} features, requests carry {}",
            order.len(),
            Field::DEFAULT_ORDER.len()
        )));
    }
    Ok(order)
}

/// Checks the node graph is a well-formed tree and normalises leaf weights.
fn check_tree(
    t: usize,
    mut nodes: Vec<Node>,
    n_features: usize,
    n_classes: usize,
) -> Result<Tree, StartupError> {
    if nodes.is_empty() {
        return Err(invalid(format!("tree {t} has no nodes")));
    }
    let n_nodes = nodes.len();
    for (i, node) in nodes.iter_mut().enumerate() {
        match node {
            Node::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if *feature >= n_features {
                    return Err(invalid(format!(
                        "tree {t} node {i}: feature index {feature} out of range"
                    )));
                }
                if !threshold.is_finite() {
                    return Err(invalid(format!("tree {t} node {i}: non-finite threshold")));
                }
                // children after their parent keeps traversal acyclic
                for child in [*left, *right] {
                    if child <= i || child >= n_nodes {
                        return Err(invalid(format!(
                            "tree {t} node {i}: bad child index {child}"
                        )));
                    }
                }
            }
            Node::Leaf { value } => {
                if value.len() != n_classes {
                    return Err(invalid(format!(
                        "tree {t} node {i}: leaf has {} weights, expected {n_classes}",
                        value.len()
                    )));
                }
                if value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                    return Err(invalid(format!("tree {t} node {i}: bad leaf weight")));
                }
                let total: f64 = value.iter().sum();
                if total <= 0.0 {
                    return Err(invalid(format!("tree {t} node {i}: leaf weights sum to zero")));
                }
                value.iter_mut().for_each(|w| *w /= total);
            }
        }
    }
    Ok(Tree { nodes })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Hour is feature 0; three classes.
    const STUMP: &str = r#"{
        "algorithm": "RandomForestClassifier",
        "n_classes": 3,
        "trees": [
            {"nodes": [
                {"feature": 0, "threshold": 9.5, "left": 1, "right": 2},
                {"value": [8, 2, 0]},
                {"value": [1, 1, 8]}
            ]},
            {"nodes": [
                {"value": [1, 1, 2]}
            ]}
        ]
    }"#;

    fn x(hour: i64) -> FeatureVector {
        FeatureVector(vec![hour, 0, 0, 0, 0, 0])
    }

    #[test]
    fn averages_normalised_leaves() {
        let m = ForestModel::from_json_str(STUMP).unwrap();
        assert_eq!(m.n_trees(), 2);
        assert_eq!(m.feature_order(), &Field::DEFAULT_ORDER);

        let s = m.predict(&x(8)).unwrap();
        assert_eq!(s.class_index, 0);
        // (0.8 + 0.25) / 2
        assert!((s.confidence() - 0.525).abs() < 1e-9);

        let s = m.predict(&x(18)).unwrap();
        assert_eq!(s.class_index, 2);
        assert!((s.confidence() - 0.65).abs() < 1e-9);
        assert!((s.probabilities.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn threshold_is_inclusive_on_the_left() {
        let m = ForestModel::from_json_str(
            r#"{"algorithm": "DecisionTreeClassifier", "n_classes": 2, "trees": [{"nodes": [
                {"feature": 0, "threshold": 9.0, "left": 1, "right": 2},
                {"value": [1, 0]},
                {"value": [0, 1]}
            ]}]}"#,
        )
        .unwrap();
        assert_eq!(m.predict(&x(9)).unwrap().class_index, 0);
        assert_eq!(m.predict(&x(10)).unwrap().class_index, 1);
    }

    #[test]
    fn ties_pick_the_first_class() {
        let s = ClassScores::from_probabilities(vec![0.25, 0.375, 0.375, 0.0]).unwrap();
        assert_eq!(s.class_index, 1);
    }

    #[test]
    fn rejects_wrong_vector_length() {
        let m = ForestModel::from_json_str(STUMP).unwrap();
        let err = m.predict(&FeatureVector(vec![8, 0])).unwrap_err();
        assert_eq!(err, PredictionError::FeatureLength { got: 2, expected: 6 });
    }

    #[test]
    fn honours_declared_feature_order() {
        let m = ForestModel::from_json_str(
            r#"{"algorithm": "RandomForestClassifier", "n_classes": 2,
                "feature_names": ["Day_of_Week", "Public_Holiday", "Road_Name",
                                  "Population_Density", "Rainfall", "Hour"],
                "trees": [{"nodes": [{"value": [1, 1]}]}]}"#,
        )
        .unwrap();
        assert_eq!(m.feature_order()[5], Field::Hour);
        assert_eq!(m.feature_order()[0], Field::DayOfWeek);
    }

    #[test]
    fn rejects_malformed_artifacts() {
        let cases = [
            // cycle back to the root
            r#"{"algorithm": "x", "n_classes": 2, "trees": [{"nodes": [
                {"feature": 0, "threshold": 1.0, "left": 0, "right": 1}, {"value": [1, 1]}]}]}"#,
            // feature index past the vector
            r#"{"algorithm": "x", "n_classes": 2, "trees": [{"nodes": [
                {"feature": 6, "threshold": 1.0, "left": 1, "right": 2},
                {"value": [1, 1]}, {"value": [1, 1]}]}]}"#,
            // leaf width differs from n_classes
            r#"{"algorithm": "x", "n_classes": 2, "trees": [{"nodes": [{"value": [1, 1, 1]}]}]}"#,
            // empty leaf weights
            r#"{"algorithm": "x", "n_classes": 2, "trees": [{"nodes": [{"value": [0, 0]}]}]}"#,
            // no trees
            r#"{"algorithm": "x", "n_classes": 2, "trees": []}"#,
            // unknown feature name
            r#"{"algorithm": "x", "n_classes": 2, "feature_names": ["Hour", "Speed"],
                "trees": [{"nodes": [{"value": [1, 1]}]}]}"#,
        ];
        for case in cases {
            let err = ForestModel::from_json_str(case).unwrap_err();
            assert!(matches!(err, StartupError::InvalidModel(_)), "{case}: {err}");
        }
    }

    #[test]
    fn parse_errors_name_their_source() {
        let err = ForestModel::from_json_str("{\"algorithm\": ").unwrap_err();
        assert!(matches!(err, StartupError::Json(_)));
        assert!(err.to_string().starts_with("malformed model JSON"), "{err}");

        let path = std::env::temp_dir().join("congestion_predictor_bad_model.json");
        fs::write(&path, "not json").unwrap();
        let err = ForestModel::load(&path).unwrap_err();
        let _ = fs::remove_file(&path);
        assert!(matches!(err, StartupError::Parse { .. }));
        assert_eq!(err.to_string(), format!("failed to parse {}", path.display()));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ForestModel::load(Path::new("/nonexistent/traffic_model.json")).unwrap_err();
        assert!(matches!(err, StartupError::Read { .. }));
    }
}
