//! Stage planning: resolve a validated graph into the ordered list of
//! generated programs a run will execute.
//!
//! The precomputed-split decision is made exactly once per run — a
//! `dataSplit` node with an edge into the trainer switches *both* the
//! train/tune stage and the evaluate stage to the precomputed variants, so
//! every stage of the run sees identical rows.

use gantry_codegen::{
    auto_evaluate_script, evaluate_script, explain_script, export_script, load_model_script,
    split_script, train_script, tune_script, SplitSource,
};
use gantry_types::{GantryError, NodeConfig, Result, TrainerMode};

use crate::graph::PipelineGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Split,
    Train,
    Tune,
    LoadModel,
    Script,
    Evaluate,
    Export,
    Explain,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageKind::Split => "split",
            StageKind::Train => "train",
            StageKind::Tune => "tune",
            StageKind::LoadModel => "load",
            StageKind::Script => "script",
            StageKind::Evaluate => "evaluate",
            StageKind::Export => "export",
            StageKind::Explain => "explain",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PlannedStage {
    pub kind: StageKind,
    pub node_id: String,
    pub script: String,
}

#[derive(Debug, Clone)]
pub struct RunPlan {
    pub pipeline_name: String,
    pub dataset_path: String,
    pub stages: Vec<PlannedStage>,
    pub precomputed_split: bool,
    /// Hyperparameter summary handed to the run store.
    pub hyperparameters: serde_json::Value,
}

/// Build the run plan. Assumes the graph already passed validation; any
/// inconsistency left is reported as a generator error rather than silently
/// skipped.
pub fn plan_run(graph: &PipelineGraph) -> Result<RunPlan> {
    let loader = graph.data_loader().ok_or_else(|| {
        GantryError::Validation("pipeline has no data loader".into())
    })?;
    let NodeConfig::DataLoader { file_path } = &loader.config else {
        unreachable!("data_loader() returns only dataLoader nodes");
    };
    let terminal = graph.executable().ok_or_else(|| {
        GantryError::Validation("pipeline has no trainer or script node".into())
    })?;

    let mut stages = Vec::new();

    // Split stage gates the precomputed-split variants for the whole run.
    let split_node = graph
        .data_split()
        .filter(|split| graph.has_edge(&split.id, &terminal.id));
    let source = if split_node.is_some() {
        SplitSource::Precomputed
    } else {
        SplitSource::SelfSplit
    };

    if let Some(node) = split_node {
        let NodeConfig::DataSplit(config) = &node.config else { unreachable!() };
        stages.push(PlannedStage {
            kind: StageKind::Split,
            node_id: node.id.clone(),
            script: split_script(config),
        });
    }

    // The executable stage, and what evaluation needs to know about it.
    let mut auto_detect_target = false;
    let mut eval_target: Option<String> = None;
    let mut eval_test_split = 0.2;
    let mut hyperparameters = serde_json::json!({});

    match &terminal.config {
        NodeConfig::Trainer(trainer) => {
            eval_test_split = trainer.test_split;
            match trainer.mode {
                TrainerMode::Train => {
                    eval_target = Some(trainer.target_column.clone());
                    hyperparameters = serde_json::json!({
                        "modelType": trainer.model_type.as_str(),
                        "mode": "train",
                        "testSplit": trainer.test_split,
                    });
                    stages.push(PlannedStage {
                        kind: StageKind::Train,
                        node_id: terminal.id.clone(),
                        script: train_script(trainer, source)?,
                    });
                }
                TrainerMode::Tune => {
                    eval_target = Some(trainer.target_column.clone());
                    hyperparameters = serde_json::json!({
                        "modelType": trainer.model_type.as_str(),
                        "mode": "tune",
                        "tuning": &trainer.tuning_config,
                    });
                    stages.push(PlannedStage {
                        kind: StageKind::Tune,
                        node_id: terminal.id.clone(),
                        script: tune_script(trainer, source)?,
                    });
                }
                TrainerMode::Load => {
                    // No target is configured for a loaded model; evaluation
                    // auto-detects the last column.
                    auto_detect_target = true;
                    hyperparameters = serde_json::json!({
                        "modelType": trainer.model_type.as_str(),
                        "mode": "load",
                    });
                    stages.push(PlannedStage {
                        kind: StageKind::LoadModel,
                        node_id: terminal.id.clone(),
                        script: load_model_script(trainer)?,
                    });
                }
            }
        }
        NodeConfig::Script { code } => {
            auto_detect_target = true;
            stages.push(PlannedStage {
                kind: StageKind::Script,
                node_id: terminal.id.clone(),
                script: code.clone(),
            });
        }
        _ => unreachable!("executable() returns only trainer/script nodes"),
    }

    // Evaluate only when an evaluator consumes the executable stage.
    let evaluator = graph
        .nodes_where(|c| matches!(c, NodeConfig::Evaluator {}))
        .find(|node| graph.has_edge(&terminal.id, &node.id));
    if let Some(node) = evaluator {
        let script = if auto_detect_target {
            auto_evaluate_script(eval_test_split)?
        } else {
            let target = eval_target.as_deref().unwrap_or_default();
            evaluate_script(target, eval_test_split, source)?
        };
        stages.push(PlannedStage {
            kind: StageKind::Evaluate,
            node_id: node.id.clone(),
            script,
        });
    }

    // Export when an exporter consumes the trainer or the evaluator.
    let exporter = graph
        .nodes_where(|c| matches!(c, NodeConfig::ModelExporter(_)))
        .find(|node| {
            graph.incoming_edges(&node.id).iter().any(|e| {
                e.source == terminal.id
                    || evaluator.map(|ev| e.source == ev.id).unwrap_or(false)
            })
        });
    if let Some(node) = exporter {
        let NodeConfig::ModelExporter(config) = &node.config else { unreachable!() };
        stages.push(PlannedStage {
            kind: StageKind::Export,
            node_id: node.id.clone(),
            script: export_script(config)?,
        });
    }

    // Explain when an explainer consumes the trainer or the evaluator.
    let explainer = graph
        .nodes_where(|c| matches!(c, NodeConfig::Explainer {}))
        .find(|node| {
            graph.incoming_edges(&node.id).iter().any(|e| {
                e.source == terminal.id
                    || evaluator.map(|ev| e.source == ev.id).unwrap_or(false)
            })
        });
    if let Some(node) = explainer {
        let target = if auto_detect_target { None } else { eval_target.as_deref() };
        stages.push(PlannedStage {
            kind: StageKind::Explain,
            node_id: node.id.clone(),
            script: explain_script(target)?,
        });
    }

    Ok(RunPlan {
        pipeline_name: graph.name.clone(),
        dataset_path: file_path.clone(),
        stages,
        precomputed_split: source == SplitSource::Precomputed,
        hyperparameters,
    })
}
