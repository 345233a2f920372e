//! Generator for the model-export stage.

use std::fmt::Write as _;

use gantry_types::{ExportFormat, ExporterConfig, GantryError, Result};

use crate::common::{self, MODEL_ARTIFACT, MODEL_INFO_ARTIFACT};
use crate::py;

pub fn export_script(config: &ExporterConfig) -> Result<String> {
    if config.output_file_name.is_empty() {
        return Err(GantryError::Generator {
            stage: "export".into(),
            message: "output file name is empty".into(),
        });
    }

    let mut imports = vec!["import joblib"];
    match config.format {
        ExportFormat::Pickle => imports.push("import pickle"),
        ExportFormat::Onnx => {
            imports.push("from skl2onnx import convert_sklearn");
            imports.push("from skl2onnx.common.data_types import FloatTensorType");
        }
        ExportFormat::Joblib => {}
    }

    let mut s = common::prologue(&imports);
    s.push_str(common::save_model_helper());

    s.push_str(&common::require_artifact(
        MODEL_ARTIFACT,
        "run a training stage first",
    ));
    s.push_str(&common::require_artifact(
        MODEL_INFO_ARTIFACT,
        "run a training stage first",
    ));
    let _ = writeln!(s, "model = joblib.load({})", py::quote(MODEL_ARTIFACT));
    let _ = writeln!(s, "with open({}) as f:", py::quote(MODEL_INFO_ARTIFACT));
    s.push_str("    model_info = json.load(f)\n");
    let _ = writeln!(s, "output_path = {}", py::quote(&config.output_file_name));

    match config.format {
        ExportFormat::Joblib => {
            s.push_str("save_model(model, output_path)\n");
        }
        ExportFormat::Pickle => {
            s.push_str(
                r#"tmp = output_path + ".tmp"
with open(tmp, "wb") as f:
    pickle.dump(model, f)
os.replace(tmp, output_path)
"#,
            );
        }
        ExportFormat::Onnx => {
            s.push_str(
                r#"n_features = int(model_info.get("nFeatures", 0))
if n_features < 1:
    fail("Model info does not record the feature count; cannot build ONNX input type")
try:
    onx = convert_sklearn(
        model, initial_types=[("input", FloatTensorType([None, n_features]))]
    )
except Exception as exc:
    fail("ONNX conversion failed: " + str(exc))
tmp = output_path + ".tmp"
with open(tmp, "wb") as f:
    f.write(onx.SerializeToString())
os.replace(tmp, output_path)
"#,
            );
        }
    }

    s.push_str(
        "emit({\"type\": \"log\", \"message\": \"Exported model to \" + output_path})\n",
    );
    s.push_str(common::epilogue());
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exporter(format: ExportFormat, name: &str) -> ExporterConfig {
        ExporterConfig {
            format,
            output_file_name: name.to_string(),
        }
    }

    #[test]
    fn joblib_export_uses_atomic_save() {
        let script = export_script(&exporter(ExportFormat::Joblib, "model_out.joblib")).unwrap();
        assert!(script.contains("save_model(model, output_path)"));
        assert!(script.contains("output_path = \"model_out.joblib\""));
    }

    #[test]
    fn pickle_export_writes_temp_then_renames() {
        let script = export_script(&exporter(ExportFormat::Pickle, "model.pkl")).unwrap();
        assert!(script.contains("pickle.dump(model, f)"));
        assert!(script.contains("os.replace(tmp, output_path)"));
    }

    #[test]
    fn onnx_export_uses_feature_count_from_model_info() {
        let script = export_script(&exporter(ExportFormat::Onnx, "model.onnx")).unwrap();
        assert!(script.contains("FloatTensorType([None, n_features])"));
        assert!(script.contains("convert_sklearn"));
        assert!(script.contains("nFeatures"));
    }

    #[test]
    fn guards_both_artifacts() {
        let script = export_script(&exporter(ExportFormat::Joblib, "out.joblib")).unwrap();
        assert!(script.contains("if not os.path.exists(\"model.joblib\"):"));
        assert!(script.contains("if not os.path.exists(\"model_info.json\"):"));
    }

    #[test]
    fn empty_file_name_is_a_generator_error() {
        let err = export_script(&exporter(ExportFormat::Joblib, "")).unwrap_err();
        assert!(matches!(err, GantryError::Generator { .. }));
    }

    #[test]
    fn hostile_file_name_is_escaped() {
        let script = export_script(&exporter(ExportFormat::Joblib, "a\"b\\c.joblib")).unwrap();
        assert!(script.contains(r#"output_path = "a\"b\\c.joblib""#));
    }
}
