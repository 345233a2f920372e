//! Shared fragments of generated Python programs.
//!
//! Stages communicate through three well-known artifacts in the working
//! directory, and every generated program speaks the same line protocol:
//! one JSON object per stdout line, `error` + non-zero exit on any
//! unrecoverable condition. The helpers here keep those contracts in one
//! place so all eleven generators agree.

use std::fmt::Write as _;

use gantry_types::ProblemType;

use crate::py;

/// Train/test row indices plus split metadata, written by the split stage.
pub const SPLIT_ARTIFACT: &str = "split_indices.json";
/// The serialized fitted model.
pub const MODEL_ARTIFACT: &str = "model.joblib";
/// Feature count/names, encoder classes, and model identity.
pub const MODEL_INFO_ARTIFACT: &str = "model_info.json";

/// Which rows a stage trains/tests on: its own inline split, or indices
/// loaded from the split artifact produced by an upstream split stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitSource {
    SelfSplit,
    Precomputed,
}

/// Program prologue: imports, the `emit`/`fail` protocol helpers, and the
/// atomic-write helpers. Every generated program starts with this.
pub fn prologue(extra_imports: &[&str]) -> String {
    let mut s = String::new();
    s.push_str("import sys\nimport os\nimport json\n");
    for imp in extra_imports {
        s.push_str(imp);
        s.push('\n');
    }
    s.push_str(
        r#"

def emit(obj):
    print(json.dumps(obj), flush=True)


def fail(message):
    emit({"type": "error", "message": str(message)})
    sys.exit(1)


def write_json(path, obj):
    tmp = path + ".tmp"
    with open(tmp, "w") as f:
        json.dump(obj, f)
    os.replace(tmp, path)

"#,
    );
    s
}

/// Atomic model persistence helper (write to a temp name, then rename, so
/// an external SIGTERM cannot leave a truncated artifact behind).
pub fn save_model_helper() -> &'static str {
    r#"
def save_model(model, path):
    tmp = path + ".tmp"
    joblib.dump(model, tmp)
    os.replace(tmp, path)

"#
}

/// Load the dataset from `sys.argv[1]` into `df`, failing fast with a
/// protocol error when the path is missing or unreadable.
pub fn load_dataset() -> &'static str {
    r#"
if len(sys.argv) < 2:
    fail("No dataset path provided")
data_path = sys.argv[1]
if not os.path.exists(data_path):
    fail("Dataset not found: " + data_path)
try:
    df = pd.read_csv(data_path)
except Exception as exc:
    fail("Could not read dataset: " + str(exc))
if df.empty:
    fail("Dataset is empty")
"#
}

/// Guard that a required artifact exists before proceeding.
pub fn require_artifact(path: &str, hint: &str) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "if not os.path.exists({}):", py::quote(path));
    let _ = writeln!(
        s,
        "    fail(\"Required artifact '{}' not found; {}\")",
        py::escape(path),
        py::escape(hint)
    );
    s
}

/// Bind `target_column` (escaped) and verify it exists in `df`.
pub fn bind_target(target: &str) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "target_column = {}", py::quote(target));
    s.push_str(
        r#"if target_column not in df.columns:
    fail("Target column '" + target_column + "' not found in dataset")
y = df[target_column]
X = df.drop(columns=[target_column])
"#,
    );
    s
}

/// Take the last column as the target (auto-detect mode for loaded or
/// script-sourced models).
pub fn bind_target_last_column() -> &'static str {
    r#"
if df.shape[1] < 2:
    fail("Dataset needs at least two columns for auto-detect evaluation")
target_column = df.columns[-1]
y = df[target_column]
X = df.drop(columns=[target_column])
"#
}

/// The fixed preprocessing routine inlined into train/tune stages: drop
/// identifier-like and high-cardinality text columns, impute, label-encode,
/// and collect the encoder classes for the model-info artifact.
pub fn preprocess_fit() -> &'static str {
    r#"
encoders = {}
dropped_columns = []
n_rows = len(X)
for col in list(X.columns):
    if X[col].dtype == object:
        n_unique = X[col].nunique(dropna=True)
        if col.lower().endswith("id") or (n_rows > 0 and n_unique / n_rows > 0.9) or n_unique > 50:
            X = X.drop(columns=[col])
            dropped_columns.append(col)
if dropped_columns:
    emit({"type": "log", "message": "Dropped columns: " + ", ".join(dropped_columns)})

for col in X.columns:
    if X[col].dtype == object:
        mode = X[col].mode()
        X[col] = X[col].fillna(mode.iloc[0] if not mode.empty else "")
        le = LabelEncoder()
        X[col] = le.fit_transform(X[col].astype(str))
        encoders[col] = [str(c) for c in le.classes_]
    else:
        X[col] = X[col].fillna(X[col].median())
"#
}

/// Replay of the training-time preprocessing for stages that consume an
/// existing model: reuse the persisted encoder classes, align columns to
/// the training feature set, impute the rest.
pub fn preprocess_apply() -> String {
    let mut s = String::new();
    s.push_str(&require_artifact(
        MODEL_INFO_ARTIFACT,
        "run a training stage first",
    ));
    let _ = writeln!(s, "with open({}) as f:", py::quote(MODEL_INFO_ARTIFACT));
    s.push_str("    model_info = json.load(f)\n");
    s.push_str(
        r#"
for col, classes in model_info.get("encoders", {}).items():
    if col in X.columns:
        mapping = {c: i for i, c in enumerate(classes)}
        X[col] = X[col].astype(str).map(mapping).fillna(-1).astype(int)

feature_names = model_info.get("featureNames") or list(X.columns)
missing = [c for c in feature_names if c not in X.columns]
if missing:
    fail("Dataset is missing feature columns: " + ", ".join(missing))
X = X[feature_names]
for col in X.columns:
    if X[col].dtype == object:
        fail("Column '" + col + "' was not numeric after encoding")
    X[col] = X[col].fillna(X[col].median())
"#,
    );
    s
}

/// Write the model-info artifact after fitting. Expects `model`, `X`,
/// `encoders`, and `target_column` in scope.
pub fn write_model_info(model_type_name: &str, problem: ProblemType) -> String {
    let mut s = String::new();
    let _ = writeln!(s, "write_json({}, {{", py::quote(MODEL_INFO_ARTIFACT));
    s.push_str("    \"modelClass\": type(model).__name__,\n");
    let _ = writeln!(s, "    \"modelType\": {},", py::quote(model_type_name));
    let _ = writeln!(s, "    \"problemType\": {},", py::quote(problem.as_str()));
    s.push_str(
        r#"    "nFeatures": int(X.shape[1]),
    "featureNames": [str(c) for c in X.columns],
    "encoders": encoders,
    "targetColumn": target_column,
})
"#,
    );
    s
}

/// Row selection for train/test. Self-split performs an inline
/// `train_test_split`; precomputed loads indices from the split artifact.
/// Expects `X` and `y` in scope; binds `X_train/X_test/y_train/y_test`.
pub fn split_rows(source: SplitSource, test_size: f64, stratified: bool) -> String {
    match source {
        SplitSource::SelfSplit => {
            let stratify = if stratified { "y" } else { "None" };
            format!(
                "X_train, X_test, y_train, y_test = train_test_split(\n    X, y, test_size={}, random_state=42, stratify={}\n)\n",
                py::float_literal(test_size),
                stratify
            )
        }
        SplitSource::Precomputed => {
            let mut s = String::new();
            s.push_str(&require_artifact(
                SPLIT_ARTIFACT,
                "connect a data split node and run the split stage first",
            ));
            let _ = writeln!(s, "with open({}) as f:", py::quote(SPLIT_ARTIFACT));
            s.push_str(
                r#"    split = json.load(f)
train_idx = split.get("trainIndices", [])
test_idx = split.get("testIndices", [])
if not train_idx or not test_idx:
    fail("Split artifact has empty index lists")
max_idx = max(max(train_idx), max(test_idx))
if max_idx >= len(X):
    fail("Split artifact does not match this dataset (index out of range)")
X_train, X_test = X.iloc[train_idx], X.iloc[test_idx]
y_train, y_test = y.iloc[train_idx], y.iloc[test_idx]
"#,
            );
            s
        }
    }
}

/// Metric computation + `metrics` event. The classifier/regressor branch is
/// decided at runtime by a capability check on the model object, never from
/// static configuration. Binary averaging applies only when the observed
/// class count is exactly two; anything else is weighted.
pub fn emit_metrics_block() -> &'static str {
    r#"
y_pred = model.predict(X_test)
is_classifier = hasattr(model, "classes_") or hasattr(model, "predict_proba")
if is_classifier:
    n_classes = len(getattr(model, "classes_", pd.unique(y_train)))
    average = "binary" if n_classes == 2 else "weighted"
    metrics = {
        "accuracy": float(accuracy_score(y_test, y_pred)),
        "precision": float(precision_score(y_test, y_pred, average=average, zero_division=0)),
        "recall": float(recall_score(y_test, y_pred, average=average, zero_division=0)),
        "f1": float(f1_score(y_test, y_pred, average=average, zero_division=0)),
        "confusionMatrix": confusion_matrix(y_test, y_pred).tolist(),
    }
    emit({"type": "metrics", "modelType": "classification", "data": metrics})
else:
    mse = float(mean_squared_error(y_test, y_pred))
    metrics = {
        "r2": float(r2_score(y_test, y_pred)),
        "mse": mse,
        "rmse": float(mse ** 0.5),
        "mae": float(mean_absolute_error(y_test, y_pred)),
    }
    emit({"type": "metrics", "modelType": "regression", "data": metrics})
"#
}

/// Imports for the metric block above.
pub fn metric_imports() -> &'static [&'static str] {
    &[
        "from sklearn.metrics import accuracy_score, precision_score, recall_score, f1_score, confusion_matrix",
        "from sklearn.metrics import r2_score, mean_squared_error, mean_absolute_error",
    ]
}

/// Final `complete` event.
pub fn epilogue() -> &'static str {
    "\nemit({\"type\": \"complete\"})\n"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prologue_defines_protocol_helpers() {
        let p = prologue(&["import pandas as pd"]);
        assert!(p.contains("def emit(obj):"));
        assert!(p.contains("def fail(message):"));
        assert!(p.contains("sys.exit(1)"));
        assert!(p.contains("import pandas as pd"));
    }

    #[test]
    fn require_artifact_escapes_hint() {
        let guard = require_artifact(MODEL_ARTIFACT, "run \"train\" first");
        assert!(guard.contains("model.joblib"));
        assert!(guard.contains("\\\"train\\\""));
    }

    #[test]
    fn bind_target_escapes_column_name() {
        let block = bind_target("my \"weird\" column");
        assert!(block.contains(r#"target_column = "my \"weird\" column""#));
    }

    #[test]
    fn self_split_renders_test_size_and_stratify() {
        let block = split_rows(SplitSource::SelfSplit, 0.2, true);
        assert!(block.contains("test_size=0.2"));
        assert!(block.contains("stratify=y"));

        let block = split_rows(SplitSource::SelfSplit, 0.25, false);
        assert!(block.contains("stratify=None"));
    }

    #[test]
    fn precomputed_split_guards_artifact() {
        let block = split_rows(SplitSource::Precomputed, 0.2, true);
        assert!(block.contains(SPLIT_ARTIFACT));
        assert!(block.contains("fail(\"Required artifact"));
        assert!(block.contains("trainIndices"));
        assert!(block.contains("index out of range"));
    }

    #[test]
    fn metrics_block_covers_both_branches() {
        let block = emit_metrics_block();
        assert!(block.contains("hasattr(model, \"classes_\")"));
        assert!(block.contains("\"modelType\": \"classification\""));
        assert!(block.contains("\"modelType\": \"regression\""));
        assert!(block.contains("\"binary\" if n_classes == 2 else \"weighted\""));
    }
}
