//! Generators for the evaluator stage.
//!
//! Three entry points: explicit-target evaluation with a self split,
//! explicit-target evaluation against precomputed split indices, and the
//! auto-detect variant that assumes the last column is the target (used for
//! loaded or script-sourced models, where no target is configured).
//!
//! The classifier/regressor branch is decided inside the generated program
//! by a capability check on the loaded model — configuration may say one
//! thing, but the artifact on disk is the truth.

use std::fmt::Write as _;

use gantry_types::Result;

use crate::common::{self, SplitSource, MODEL_ARTIFACT};
use crate::py;

/// Evaluate against an explicit target column.
pub fn evaluate_script(target_column: &str, test_split: f64, source: SplitSource) -> Result<String> {
    build(Some(target_column), test_split, source)
}

/// Evaluate a model of unknown provenance: the last dataset column is
/// assumed to be the target, and the stage always self-splits.
pub fn auto_evaluate_script(test_split: f64) -> Result<String> {
    build(None, test_split, SplitSource::SelfSplit)
}

fn build(target: Option<&str>, test_split: f64, source: SplitSource) -> Result<String> {
    let mut imports = vec![
        "import pandas as pd",
        "import joblib",
        "from sklearn.model_selection import train_test_split",
    ];
    imports.extend_from_slice(common::metric_imports());

    let mut s = common::prologue(&imports);
    s.push_str(common::load_dataset());

    match target {
        Some(column) => s.push_str(&common::bind_target(column)),
        None => s.push_str(common::bind_target_last_column()),
    }

    s.push_str(&common::require_artifact(
        MODEL_ARTIFACT,
        "run a training stage first",
    ));
    let _ = writeln!(s, "model = joblib.load({})", py::quote(MODEL_ARTIFACT));

    s.push_str(&common::preprocess_apply());

    // Stratify only when the loaded model turns out to be a classifier.
    match source {
        SplitSource::SelfSplit => {
            let _ = writeln!(
                s,
                r#"
stratify = y if (hasattr(model, "classes_") or hasattr(model, "predict_proba")) else None
X_train, X_test, y_train, y_test = train_test_split(
    X, y, test_size={}, random_state=42, stratify=stratify
)"#,
                py::float_literal(test_split)
            );
        }
        SplitSource::Precomputed => {
            s.push_str(&common::split_rows(SplitSource::Precomputed, test_split, false));
        }
    }

    s.push_str(common::emit_metrics_block());
    s.push_str(common::epilogue());
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_target_is_bound_and_escaped() {
        let script = evaluate_script("median \"value\"", 0.2, SplitSource::SelfSplit).unwrap();
        assert!(script.contains(r#"target_column = "median \"value\"""#));
    }

    #[test]
    fn auto_variant_uses_last_column() {
        let script = auto_evaluate_script(0.2).unwrap();
        assert!(script.contains("target_column = df.columns[-1]"));
        assert!(!script.contains("split_indices.json"));
    }

    #[test]
    fn guards_model_artifact() {
        let script = evaluate_script("y", 0.2, SplitSource::SelfSplit).unwrap();
        assert!(script.contains("if not os.path.exists(\"model.joblib\"):"));
        assert!(script.contains("model = joblib.load(\"model.joblib\")"));
    }

    #[test]
    fn applies_persisted_encoders() {
        let script = evaluate_script("y", 0.2, SplitSource::SelfSplit).unwrap();
        assert!(script.contains("model_info.get(\"encoders\""));
        assert!(script.contains("featureNames"));
    }

    #[test]
    fn precomputed_variant_loads_indices() {
        let script = evaluate_script("y", 0.2, SplitSource::Precomputed).unwrap();
        assert!(script.contains("split_indices.json"));
        assert!(script.contains("testIndices"));
        assert!(!script.contains("stratify = y if"));
    }

    #[test]
    fn runtime_type_detection_present_in_both_variants() {
        for script in [
            evaluate_script("y", 0.2, SplitSource::SelfSplit).unwrap(),
            auto_evaluate_script(0.3).unwrap(),
        ] {
            assert!(script.contains("is_classifier = hasattr(model, \"classes_\")"));
            assert!(script.contains("\"modelType\": \"regression\""));
            assert!(script.contains("\"modelType\": \"classification\""));
        }
    }
}
