//! Generator for the model-explanation stage.
//!
//! Three sub-stages, each reported through `explainProgress`:
//! permutation feature importance, SHAP attributions, and partial
//! dependence for the most important features. The SHAP explainer is picked
//! by model class — Tree for tree ensembles, Linear for linear models, and
//! a sampled Kernel explainer (capped at 50 background rows) for everything
//! else. Classification SHAP values are normalized to (class, sample,
//! feature) ordering regardless of the shape the library returns.

use std::fmt::Write as _;

use gantry_types::Result;

use crate::common::{self, MODEL_ARTIFACT};
use crate::py;

/// How many top features get partial-dependence curves.
const TOP_FEATURES: usize = 5;
/// Row cap for SHAP evaluation and the kernel background sample.
const SHAP_SAMPLE_ROWS: usize = 50;
/// Individual (per-row) curves included for regression partial dependence.
const ICE_SAMPLE_ROWS: usize = 20;

pub fn explain_script(target_column: Option<&str>) -> Result<String> {
    let mut s = common::prologue(&[
        "import time",
        "import numpy as np",
        "import pandas as pd",
        "import joblib",
        "import shap",
        "from sklearn.inspection import partial_dependence, permutation_importance",
    ]);
    s.push_str(common::load_dataset());

    match target_column {
        Some(column) => s.push_str(&common::bind_target(column)),
        None => s.push_str(common::bind_target_last_column()),
    }

    s.push_str(&common::require_artifact(
        MODEL_ARTIFACT,
        "run a training stage first",
    ));
    let _ = writeln!(s, "model = joblib.load({})", py::quote(MODEL_ARTIFACT));
    s.push_str(&common::preprocess_apply());

    s.push_str(
        r#"
start_time = time.time()
is_classifier = hasattr(model, "classes_") or hasattr(model, "predict_proba")
feature_names = [str(c) for c in X.columns]
"#,
    );

    // Stage 1: permutation importance.
    s.push_str(
        r#"
emit({"type": "explainProgress", "stage": "importance", "percentComplete": 0})
try:
    perm = permutation_importance(model, X, y, n_repeats=5, random_state=42)
except Exception as exc:
    fail("Permutation importance failed: " + str(exc))
order = np.argsort(perm.importances_mean)[::-1]
emit({
    "type": "featureImportance",
    "data": {
        "features": [feature_names[i] for i in order],
        "importances": [float(perm.importances_mean[i]) for i in order],
        "std": [float(perm.importances_std[i]) for i in order],
    },
})
emit({"type": "explainProgress", "stage": "importance", "percentComplete": 100})
"#,
    );

    // Stage 2: SHAP.
    let _ = writeln!(
        s,
        r#"
emit({{"type": "explainProgress", "stage": "shap", "percentComplete": 0}})
TREE_MODELS = (
    "RandomForestClassifier", "RandomForestRegressor",
    "GradientBoostingClassifier", "GradientBoostingRegressor",
    "DecisionTreeClassifier", "DecisionTreeRegressor",
)
LINEAR_MODELS = ("LogisticRegression", "LinearRegression", "Ridge", "Lasso")
model_class = type(model).__name__
X_shap = X.iloc[:{shap_rows}]
try:
    if model_class in TREE_MODELS:
        explainer_kind = "tree"
        explainer = shap.TreeExplainer(model)
        shap_values = explainer.shap_values(X_shap)
    elif model_class in LINEAR_MODELS:
        explainer_kind = "linear"
        explainer = shap.LinearExplainer(model, X_shap)
        shap_values = explainer.shap_values(X_shap)
    else:
        explainer_kind = "kernel"
        background = shap.sample(X, {shap_rows}, random_state=42)
        predict = model.predict_proba if is_classifier and hasattr(model, "predict_proba") else model.predict
        explainer = shap.KernelExplainer(predict, background)
        shap_values = explainer.shap_values(X_shap)
except Exception as exc:
    fail("SHAP computation failed: " + str(exc))
"#,
        shap_rows = SHAP_SAMPLE_ROWS
    );
    s.push_str(
        r#"
# Normalize to (class, sample, feature) for classification, a single
# (sample, feature) matrix for regression.
if isinstance(shap_values, list):
    values = np.array(shap_values)
else:
    values = np.asarray(shap_values)
    if values.ndim == 3:
        values = np.moveaxis(values, -1, 0)
    elif is_classifier:
        values = values[np.newaxis, :, :]
if not is_classifier and values.ndim == 3:
    values = values[0]
emit({
    "type": "shapData",
    "data": {
        "values": values.tolist(),
        "featureNames": feature_names,
        "sampleCount": int(X_shap.shape[0]),
        "explainer": explainer_kind,
    },
})
emit({"type": "explainProgress", "stage": "shap", "percentComplete": 100})
"#,
    );

    // Stage 3: partial dependence for the top features by importance.
    let _ = writeln!(
        s,
        r#"
emit({{"type": "explainProgress", "stage": "partialDependence", "percentComplete": 0}})
top_indices = [int(i) for i in order[:{top}]]
for rank, feat_idx in enumerate(top_indices):
    feat_name = feature_names[feat_idx]
    try:
        if is_classifier:
            result = partial_dependence(model, X, [feat_idx], kind="average")
            grid = result["grid_values"][0] if "grid_values" in result else result["values"][0]
            curves = [[float(v) for v in row] for row in np.atleast_2d(result["average"])]
            classes = [str(c) for c in getattr(model, "classes_", range(len(curves)))]
            payload = {{
                "feature": feat_name,
                "grid": [float(v) for v in grid],
                "curves": curves,
                "classes": classes[: len(curves)],
            }}
        else:
            result = partial_dependence(model, X, [feat_idx], kind="both")
            grid = result["grid_values"][0] if "grid_values" in result else result["values"][0]
            mean_curve = [float(v) for v in np.asarray(result["average"])[0]]
            individual = np.asarray(result["individual"])[0]
            sampled = individual[:{ice_rows}]
            payload = {{
                "feature": feat_name,
                "grid": [float(v) for v in grid],
                "mean": mean_curve,
                "individual": [[float(v) for v in row] for row in sampled],
            }}
    except Exception as exc:
        fail("Partial dependence failed for '" + feat_name + "': " + str(exc))
    emit({{"type": "partialDependence", "data": payload}})
    emit({{
        "type": "explainProgress",
        "stage": "partialDependence",
        "percentComplete": int((rank + 1) * 100 / len(top_indices)),
    }})
"#,
        top = TOP_FEATURES,
        ice_rows = ICE_SAMPLE_ROWS
    );

    s.push_str(
        r#"
emit({
    "type": "explainMetadata",
    "data": {
        "modelClass": model_class,
        "explainer": explainer_kind,
        "problemType": "classification" if is_classifier else "regression",
        "featureNames": feature_names,
        "targetColumn": target_column,
    },
})
emit({"type": "explainComplete", "durationMs": int((time.time() - start_time) * 1000)})
"#,
    );
    s.push_str(common::epilogue());
    Ok(s)
}
