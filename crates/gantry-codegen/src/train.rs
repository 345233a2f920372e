//! Generators for the trainer stage: fit a new model, or load and verify a
//! pre-trained artifact.

use std::fmt::Write as _;

use gantry_types::{GantryError, Result, TrainerConfig, TrainerMode};

use crate::common::{self, SplitSource, MODEL_ARTIFACT};
use crate::py;

/// Generate the training program. `source` selects the self-split or
/// precomputed-split variant; the orchestrator decides once per run.
pub fn train_script(config: &TrainerConfig, source: SplitSource) -> Result<String> {
    if config.mode != TrainerMode::Train {
        return Err(GantryError::Generator {
            stage: "train".into(),
            message: format!("trainer mode is {:?}, not train", config.mode),
        });
    }
    let model = config.model_type;
    let estimator_import = format!(
        "from {} import {}",
        model.estimator_module(),
        model.estimator_class()
    );

    let mut imports = vec![
        "import pandas as pd",
        "import joblib",
        "from sklearn.model_selection import train_test_split",
        "from sklearn.preprocessing import LabelEncoder",
        estimator_import.as_str(),
    ];
    imports.extend_from_slice(common::metric_imports());

    let mut s = common::prologue(&imports);
    s.push_str(common::save_model_helper());
    s.push_str(common::load_dataset());
    s.push_str(&common::bind_target(&config.target_column));
    s.push_str(common::preprocess_fit());
    s.push_str("\nemit({\"type\": \"progress\", \"current\": 1, \"total\": 4})\n");

    let stratified = model.problem_type() == gantry_types::ProblemType::Classification;
    s.push_str(&common::split_rows(source, config.test_split, stratified));

    s.push_str("\nemit({\"type\": \"progress\", \"current\": 2, \"total\": 4})\n");
    let _ = writeln!(
        s,
        "model = {}({})",
        model.estimator_class(),
        model.constructor_args()
    );
    s.push_str(
        r#"try:
    model.fit(X_train, y_train)
except Exception as exc:
    fail("Training failed: " + str(exc))
"#,
    );
    s.push_str("emit({\"type\": \"progress\", \"current\": 3, \"total\": 4})\n");

    s.push_str(common::emit_metrics_block());

    let _ = writeln!(s, "\nsave_model(model, {})", py::quote(MODEL_ARTIFACT));
    s.push_str(&common::write_model_info(model.as_str(), model.problem_type()));
    s.push_str("emit({\"type\": \"progress\", \"current\": 4, \"total\": 4})\n");
    s.push_str(common::epilogue());
    Ok(s)
}

/// Generate the load-model program: verify the user-supplied artifact
/// loads, copy it to the model artifact path, and derive model-info from
/// the loaded object. No fitting happens.
pub fn load_model_script(config: &TrainerConfig) -> Result<String> {
    let source_path = config.model_file_path.as_deref().filter(|p| !p.is_empty()).ok_or_else(|| {
        GantryError::Generator {
            stage: "load".into(),
            message: "load mode requires a model file path".into(),
        }
    })?;

    let mut s = common::prologue(&["import joblib"]);
    s.push_str(common::save_model_helper());

    let _ = writeln!(s, "\nsource_path = {}", py::quote(source_path));
    s.push_str(
        r#"if not os.path.exists(source_path):
    fail("Model file not found: " + source_path)
try:
    model = joblib.load(source_path)
except Exception as exc:
    fail("Could not load model: " + str(exc))
if not hasattr(model, "predict"):
    fail("Loaded object is not a fitted model (no predict method)")
"#,
    );
    let _ = writeln!(s, "save_model(model, {})", py::quote(MODEL_ARTIFACT));

    // Model info comes from the loaded object; there is no training frame.
    let _ = writeln!(s, "write_json({}, {{", py::quote(common::MODEL_INFO_ARTIFACT));
    s.push_str(
        r#"    "modelClass": type(model).__name__,
    "modelType": "loaded",
    "problemType": "classification" if hasattr(model, "classes_") else "regression",
    "nFeatures": int(getattr(model, "n_features_in_", 0)),
    "featureNames": [str(c) for c in getattr(model, "feature_names_in_", [])],
    "encoders": {},
    "targetColumn": None,
})
"#,
    );
    s.push_str(
        "emit({\"type\": \"log\", \"message\": \"Loaded \" + type(model).__name__ + \" from \" + source_path})\n",
    );
    s.push_str(common::epilogue());
    Ok(s)
}
