//! Historical risk model.
//!
//! The model is trained offline on `(dist_to_blackspot_km, junction_complexity)`
//! pairs and saved in XGBoost's JSON model format. Only inference lives here:
//! the artifact is parsed once at startup into a [`TreeEnsemble`] and shared
//! read-only between requests.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::ModelError;
use crate::labeler::LABEL_RULE_VERSION;

pub const DEFAULT_MODEL_PATH: &str = "data/models/blr_risk_xgboost.json";

const NUM_FEATURES: usize = 2;
const LEAF: i32 = -1;

/// Binary risk model: probability that a location is historically high risk.
pub trait Classifier: Send + Sync {
    fn predict_probability(&self, distance_km: f64, junction_complexity: u32) -> f64;
}

#[derive(Deserialize)]
struct ModelFile {
    learner: Learner,
}

#[derive(Deserialize)]
struct Learner {
    #[serde(default)]
    attributes: HashMap<String, String>,
    gradient_booster: GradientBooster,
    learner_model_param: LearnerModelParam,
    objective: Objective,
}

#[derive(Deserialize)]
struct GradientBooster {
    model: GbTreeModel,
}

#[derive(Deserialize)]
struct GbTreeModel {
    trees: Vec<Tree>,
}

#[derive(Deserialize)]
struct LearnerModelParam {
    base_score: String,
}

#[derive(Deserialize)]
struct Objective {
    name: String,
}

/// Flat array encoding of one regression tree, as XGBoost writes it.
#[derive(Debug, Clone, Deserialize)]
struct Tree {
    left_children: Vec<i32>,
    right_children: Vec<i32>,
    split_indices: Vec<usize>,
    /// Threshold for split nodes, leaf weight for leaves.
    split_conditions: Vec<f64>,
}

impl Tree {
    fn validate(&self, tree: usize) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidTree { tree, reason };
        let n = self.left_children.len();
        if n == 0 {
            return Err(invalid("no nodes".into()));
        }
        if self.right_children.len() != n
            || self.split_indices.len() != n
            || self.split_conditions.len() != n
        {
            return Err(invalid("node arrays differ in length".into()));
        }
        for node in 0..n {
            let (left, right) = (self.left_children[node], self.right_children[node]);
            if left == LEAF {
                continue;
            }
            // children always follow their parent, which also rules out cycles
            for child in [left, right] {
                if child <= node as i32 || child as usize >= n {
                    return Err(invalid(format!("node {node} has bad child {child}")));
                }
            }
            if self.split_indices[node] >= NUM_FEATURES {
                return Err(invalid(format!(
                    "node {node} splits on feature {}",
                    self.split_indices[node]
                )));
            }
        }
        Ok(())
    }

    fn leaf_value(&self, features: &[f64; NUM_FEATURES]) -> f64 {
        let mut node = 0usize;
        while self.left_children[node] != LEAF {
            // XGBoost stores features and thresholds as f32 and compares there
            let x = features[self.split_indices[node]] as f32;
            let goes_left = x < self.split_conditions[node] as f32;
            let next = if goes_left {
                self.left_children[node]
            } else {
                self.right_children[node]
            };
            node = next as usize;
        }
        self.split_conditions[node]
    }
}

/// Gradient-boosted tree ensemble with a logistic link.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    base_margin: f64,
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        if !path.exists() {
            return Err(ModelError::Missing(path.to_path_buf()));
        }
        let text = fs::read_to_string(path)?;
        let model = Self::from_json(&text)?;
        info!(path = %path.display(), trees = model.trees.len(), "risk model loaded");
        Ok(model)
    }

    pub fn from_json(text: &str) -> Result<Self, ModelError> {
        let file: ModelFile = serde_json::from_str(text)?;
        let learner = file.learner;

        if learner.objective.name != "binary:logistic" {
            return Err(ModelError::Objective(learner.objective.name));
        }

        match learner.attributes.get("label_rule_version") {
            Some(v) if v.trim() != LABEL_RULE_VERSION.to_string() => {
                return Err(ModelError::LabelRuleMismatch {
                    found: v.clone(),
                    expected: LABEL_RULE_VERSION,
                });
            }
            Some(_) => {}
            None => warn!("model artifact carries no label_rule_version, assuming current rule"),
        }

        let base_score = parse_base_score(&learner.learner_model_param.base_score)?;
        let trees = learner.gradient_booster.model.trees;
        for (i, tree) in trees.iter().enumerate() {
            tree.validate(i)?;
        }

        Ok(Self {
            base_margin: logit(base_score),
            trees,
        })
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for TreeEnsemble {
    fn predict_probability(&self, distance_km: f64, junction_complexity: u32) -> f64 {
        let features = [distance_km, f64::from(junction_complexity)];
        let margin = self.base_margin
            + self
                .trees
                .iter()
                .map(|t| t.leaf_value(&features))
                .sum::<f64>();
        sigmoid(margin).clamp(0.0, 1.0)
    }
}

/// Accepts both `"5E-1"` and the bracketed `"[5E-1]"` form of newer releases.
fn parse_base_score(raw: &str) -> Result<f64, ModelError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    match trimmed.parse::<f64>() {
        Ok(p) if p > 0.0 && p < 1.0 => Ok(p),
        _ => Err(ModelError::BaseScore(raw.to_string())),
    }
}

fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}
