//! Hyperparameter search types: parameter specifications, the search space,
//! and the tuning configuration attached to a trainer node.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Sampling distribution for float parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Distribution {
    Uniform,
    Log,
}

/// A single tunable hyperparameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ParamSpec {
    #[serde(rename_all = "camelCase")]
    Int {
        min: i64,
        max: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        step: Option<i64>,
    },
    #[serde(rename_all = "camelCase")]
    Float {
        min: f64,
        max: f64,
        distribution: Distribution,
    },
    #[serde(rename_all = "camelCase")]
    Categorical { values: Vec<serde_json::Value> },
}

/// Named collection of parameter specifications.
///
/// A `BTreeMap` keeps iteration order deterministic so generated programs
/// are byte-stable for a given configuration.
pub type SearchSpace = BTreeMap<String, ParamSpec>;

/// Hyperparameter search strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sampler {
    Grid,
    Random,
    Bayesian,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TuningConfig {
    pub sampler: Sampler,
    /// Ignored for grid sampling, which always runs the full enumeration.
    pub n_trials: u32,
    pub cv_folds: u32,
    pub scoring_metric: String,
    pub search_space: SearchSpace,
}

/// Whether the optimizer should maximize or minimize the objective.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectiveDirection::Maximize => "maximize",
            ObjectiveDirection::Minimize => "minimize",
        }
    }
}

/// Derive the optimization direction from the scoring metric name.
///
/// Accuracy-family metrics, R², and every scikit-learn `neg_`-prefixed
/// metric (already negated, so larger is better) maximize; anything else
/// minimizes.
pub fn objective_direction(metric: &str) -> ObjectiveDirection {
    const MAXIMIZING: &[&str] = &["accuracy", "precision", "recall", "f1", "roc_auc", "r2"];
    if MAXIMIZING.contains(&metric) || metric.starts_with("neg_") {
        ObjectiveDirection::Maximize
    } else {
        ObjectiveDirection::Minimize
    }
}
