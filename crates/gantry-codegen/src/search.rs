//! Search-space validation and grid enumeration.
//!
//! Pure functions over [`ParamSpec`] / [`SearchSpace`] / [`TuningConfig`].
//! Errors accumulate — callers get every problem at once, so an editor can
//! show the full list instead of one complaint per round-trip.
//!
//! The enumeration in [`enumerate_param`] is shared by the combination
//! counter and by the tuning generator's grid-sampler dictionary; the two
//! must agree or the generated grid search would disagree with the cost
//! estimate shown to the user.

use gantry_types::{ModelType, ParamSpec, SearchSpace, Sampler, TrainerConfig, TrainerMode, TuningConfig};

/// Hard ceiling on grid combinations; beyond this the config is rejected.
const MAX_GRID_COMBINATIONS: u64 = 10_000;

/// Above this many combinations a cost warning is produced.
const GRID_WARNING_THRESHOLD: u64 = 20;

const MIN_CV_FOLDS: u32 = 2;
const MAX_CV_FOLDS: u32 = 10;
const MAX_TRIALS: u32 = 1000;

// ---------------------------------------------------------------------------
// Per-parameter validation
// ---------------------------------------------------------------------------

/// Validate one parameter specification. Returns every problem found.
///
/// Beyond the generic shape checks, well-known scikit-learn parameter names
/// carry domain rules (`n_estimators >= 1`, `C > 0`, ...). These are baked
/// in knowledge, kept exactly as the editor expects them.
pub fn validate_param_spec(name: &str, spec: &ParamSpec) -> Vec<String> {
    let mut errors = Vec::new();

    match spec {
        ParamSpec::Categorical { values } => {
            if values.is_empty() {
                errors.push(format!("'{name}': categorical parameter needs at least one value"));
            }
        }
        ParamSpec::Int { min, max, step } => {
            if min >= max {
                errors.push(format!("'{name}': min ({min}) must be less than max ({max})"));
            }
            if let Some(step) = step {
                if *step <= 0 {
                    errors.push(format!("'{name}': step must be positive, got {step}"));
                } else if min < max && *step > max - min {
                    errors.push(format!(
                        "'{name}': step ({step}) exceeds the range ({} to {})",
                        min, max
                    ));
                }
            }
            errors.extend(domain_rule(name, *min as f64));
        }
        ParamSpec::Float { min, max, .. } => {
            if min >= max {
                errors.push(format!("'{name}': min ({min}) must be less than max ({max})"));
            }
            errors.extend(domain_rule(name, *min));
        }
    }

    errors
}

/// Named-parameter domain rules, checked against the range minimum.
fn domain_rule(name: &str, min: f64) -> Option<String> {
    match name {
        "n_estimators" if min < 1.0 => {
            Some(format!("'{name}': n_estimators must be at least 1"))
        }
        "C" if min <= 0.0 => Some(format!("'{name}': C must be strictly positive")),
        "alpha" if min < 0.0 => Some(format!("'{name}': alpha must be non-negative")),
        "learning_rate" | "learning_rate_init" if min <= 0.0 => {
            Some(format!("'{name}': learning rate must be strictly positive"))
        }
        "max_depth" if min < 1.0 => Some(format!("'{name}': max_depth must be at least 1")),
        "min_samples_split" if min < 2.0 => {
            Some(format!("'{name}': min_samples_split must be at least 2"))
        }
        "min_samples_leaf" if min < 1.0 => {
            Some(format!("'{name}': min_samples_leaf must be at least 1"))
        }
        "n_neighbors" if min < 1.0 => {
            Some(format!("'{name}': n_neighbors must be at least 1"))
        }
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Grid enumeration
// ---------------------------------------------------------------------------

/// Enumerate the concrete values a parameter contributes to a grid search.
/// `None` means the parameter is not enumerable (stepless float range).
pub fn enumerate_param(spec: &ParamSpec) -> Option<Vec<serde_json::Value>> {
    match spec {
        ParamSpec::Categorical { values } => Some(values.clone()),
        ParamSpec::Int { min, max, step } => {
            let step = step.unwrap_or(1).max(1);
            let mut out = Vec::new();
            let mut v = *min;
            while v <= *max {
                out.push(serde_json::json!(v));
                v += step;
            }
            Some(out)
        }
        ParamSpec::Float { .. } => None,
    }
}

/// Number of grid combinations: the product of per-parameter counts.
/// `None` means infinite — at least one float parameter has no step, so a
/// grid is undefined. An empty space yields 0.
pub fn grid_combinations(space: &SearchSpace) -> Option<u64> {
    if space.is_empty() {
        return Some(0);
    }
    let mut product: u64 = 1;
    for spec in space.values() {
        let count = match spec {
            ParamSpec::Categorical { values } => values.len() as u64,
            ParamSpec::Int { min, max, step } => {
                if min >= max {
                    1
                } else {
                    let step = step.unwrap_or(1).max(1) as u64;
                    (max - min) as u64 / step + 1
                }
            }
            ParamSpec::Float { .. } => return None,
        };
        product = product.saturating_mul(count);
    }
    Some(product)
}

/// Human-readable cost warning for large grids. `None` when the grid is
/// small enough (or empty) that no warning is warranted.
pub fn format_grid_warning(space: &SearchSpace, cv_folds: u32) -> Option<String> {
    let combinations = grid_combinations(space)?;
    if combinations == 0 || combinations <= GRID_WARNING_THRESHOLD {
        return None;
    }
    let total_fits = combinations.saturating_mul(cv_folds as u64);
    Some(format!(
        "Grid search will run {combinations} trials ({total_fits} total model fits with {cv_folds}-fold cross-validation)"
    ))
}

// ---------------------------------------------------------------------------
// Tuning configuration validation
// ---------------------------------------------------------------------------

/// Validate a whole tuning configuration against a model type.
/// All problems are accumulated; nothing short-circuits.
pub fn validate_tuning_config(config: &TuningConfig, model_type: ModelType) -> Vec<String> {
    let mut errors = Vec::new();

    if config.sampler == Sampler::Grid {
        for (name, spec) in &config.search_space {
            if matches!(spec, ParamSpec::Float { .. }) {
                errors.push(format!(
                    "'{name}': grid sampling requires enumerable parameters; give this float a step or use categorical values"
                ));
            }
        }
        match grid_combinations(&config.search_space) {
            Some(n) if n > MAX_GRID_COMBINATIONS => {
                errors.push(format!(
                    "grid search would run {n} combinations; the limit is {MAX_GRID_COMBINATIONS}"
                ));
            }
            _ => {}
        }
    } else if config.n_trials < 1 || config.n_trials > MAX_TRIALS {
        errors.push(format!(
            "trial count must be between 1 and {MAX_TRIALS}, got {}",
            config.n_trials
        ));
    }

    if config.cv_folds < MIN_CV_FOLDS || config.cv_folds > MAX_CV_FOLDS {
        errors.push(format!(
            "cross-validation folds must be between {MIN_CV_FOLDS} and {MAX_CV_FOLDS}, got {}",
            config.cv_folds
        ));
    }

    if !model_type
        .valid_metrics()
        .contains(&config.scoring_metric.as_str())
    {
        errors.push(format!(
            "scoring metric '{}' is not valid for a {} model (expected one of: {})",
            config.scoring_metric,
            model_type.problem_type().as_str(),
            model_type.valid_metrics().join(", ")
        ));
    }

    for (name, spec) in &config.search_space {
        errors.extend(validate_param_spec(name, spec));
    }

    errors
}

/// Result of a tunability check on a trainer node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneCheck {
    pub valid: bool,
    pub reason: Option<String>,
}

impl TuneCheck {
    fn ok() -> Self {
        Self { valid: true, reason: None }
    }

    fn invalid(reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
        }
    }
}

/// Whether tuning makes sense at all for this trainer configuration.
pub fn can_tune(trainer: &TrainerConfig) -> TuneCheck {
    if trainer.mode == TrainerMode::Load {
        return TuneCheck::invalid("loaded models are not trained, so there is nothing to tune");
    }
    if trainer.model_type.tunable_params().is_empty() {
        return TuneCheck::invalid(format!(
            "{} has no tunable hyperparameters",
            trainer.model_type.as_str()
        ));
    }
    if trainer.target_column.is_empty() {
        return TuneCheck::invalid("set a target column before tuning");
    }
    TuneCheck::ok()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
