//! Node configuration for the editor graph.
//!
//! These types mirror the JSON documents the visual editor produces. Node
//! position is a UI concern and is deliberately absent — the core contract
//! is the node kind, its configuration, and the edges between nodes.

use serde::{Deserialize, Serialize};

use crate::model::ModelType;
use crate::params::TuningConfig;

/// Configuration payload of a pipeline node, tagged by node kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeConfig {
    #[serde(rename_all = "camelCase")]
    DataLoader { file_path: String },
    DataSplit(DataSplitConfig),
    Trainer(TrainerConfig),
    Evaluator {},
    ModelExporter(ExporterConfig),
    Explainer {},
    Script { code: String },
}

impl NodeConfig {
    /// Short lowercase name for diagnostics and logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeConfig::DataLoader { .. } => "dataLoader",
            NodeConfig::DataSplit(_) => "dataSplit",
            NodeConfig::Trainer(_) => "trainer",
            NodeConfig::Evaluator {} => "evaluator",
            NodeConfig::ModelExporter(_) => "modelExporter",
            NodeConfig::Explainer {} => "explainer",
            NodeConfig::Script { .. } => "script",
        }
    }

    /// Whether this node kind produces a model artifact when executed.
    pub fn produces_model(&self) -> bool {
        matches!(self, NodeConfig::Trainer(_) | NodeConfig::Script { .. })
    }
}

/// Train/test split settings. `split_ratio` is the *training* fraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSplitConfig {
    pub split_ratio: f64,
    pub random_state: u64,
    pub stratify: bool,
    pub target_column: String,
}

/// What the trainer stage does with the model: fit a new one, load a
/// pre-trained artifact, or run a hyperparameter search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainerMode {
    Train,
    Load,
    Tune,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainerConfig {
    pub model_type: ModelType,
    pub target_column: String,
    pub test_split: f64,
    pub mode: TrainerMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tuning_config: Option<TuningConfig>,
}

/// Serialization format for the model-export stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Joblib,
    Pickle,
    Onnx,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Joblib => "joblib",
            ExportFormat::Pickle => "pkl",
            ExportFormat::Onnx => "onnx",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExporterConfig {
    pub format: ExportFormat,
    pub output_file_name: String,
}

/// A directed data dependency: the target stage consumes the artifact(s)
/// the source stage produces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub source: String,
    pub target: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_config_round_trips_with_kind_tag() {
        let json = r#"{"kind":"dataLoader","filePath":"/tmp/iris.csv"}"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        match &config {
            NodeConfig::DataLoader { file_path } => assert_eq!(file_path, "/tmp/iris.csv"),
            other => panic!("unexpected variant: {other:?}"),
        }
        let back = serde_json::to_string(&config).unwrap();
        assert!(back.contains("\"kind\":\"dataLoader\""));
    }

    #[test]
    fn trainer_config_deserializes_camel_case() {
        let json = r#"{
            "kind": "trainer",
            "modelType": "random_forest",
            "targetColumn": "species",
            "testSplit": 0.2,
            "mode": "train"
        }"#;
        let config: NodeConfig = serde_json::from_str(json).unwrap();
        match config {
            NodeConfig::Trainer(t) => {
                assert_eq!(t.model_type, ModelType::RandomForest);
                assert_eq!(t.target_column, "species");
                assert_eq!(t.mode, TrainerMode::Train);
                assert!(t.model_file_path.is_none());
                assert!(t.tuning_config.is_none());
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn export_format_lowercase() {
        assert_eq!(
            serde_json::to_string(&ExportFormat::Onnx).unwrap(),
            "\"onnx\""
        );
        let f: ExportFormat = serde_json::from_str("\"joblib\"").unwrap();
        assert_eq!(f, ExportFormat::Joblib);
    }

    #[test]
    fn kind_names() {
        let split = NodeConfig::DataSplit(DataSplitConfig {
            split_ratio: 0.8,
            random_state: 42,
            stratify: true,
            target_column: "y".into(),
        });
        assert_eq!(split.kind_name(), "dataSplit");
        assert!(!split.produces_model());

        let script = NodeConfig::Script { code: "pass".into() };
        assert_eq!(script.kind_name(), "script");
        assert!(script.produces_model());
    }
}
