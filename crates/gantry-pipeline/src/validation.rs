//! Pipeline validation: lint rules and diagnostics.
//!
//! Every rule reports all of its findings; callers get the complete list so
//! the editor can show every problem at once. [`validate_or_raise`] fails
//! when any `Error`-severity diagnostic exists — and the orchestrator never
//! starts a process for such a pipeline.

use gantry_codegen::search::{can_tune, validate_tuning_config};
use gantry_types::{NodeConfig, TrainerMode};

use crate::graph::PipelineGraph;

// ---------------------------------------------------------------------------
// Diagnostic types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub rule: String,
    pub severity: Severity,
    pub message: String,
    pub node_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

fn error(rule: &str, message: impl Into<String>, node_id: Option<String>) -> Diagnostic {
    Diagnostic {
        rule: rule.into(),
        severity: Severity::Error,
        message: message.into(),
        node_id,
    }
}

fn warning(rule: &str, message: impl Into<String>, node_id: Option<String>) -> Diagnostic {
    Diagnostic {
        rule: rule.into(),
        severity: Severity::Warning,
        message: message.into(),
        node_id,
    }
}

// ---------------------------------------------------------------------------
// LintRule trait
// ---------------------------------------------------------------------------

pub trait LintRule: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic>;
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

struct DataLoaderRule;
impl LintRule for DataLoaderRule {
    fn name(&self) -> &str { "data_loader" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let loaders: Vec<_> = graph
            .nodes_where(|c| matches!(c, NodeConfig::DataLoader { .. }))
            .collect();
        match loaders.as_slice() {
            [] => vec![error(self.name(), "Pipeline has no data loader node", None)],
            [loader] => {
                if let NodeConfig::DataLoader { file_path } = &loader.config {
                    if file_path.is_empty() {
                        return vec![error(
                            self.name(),
                            format!("Data loader '{}' has no file path configured", loader.id),
                            Some(loader.id.clone()),
                        )];
                    }
                }
                vec![]
            }
            many => vec![error(
                self.name(),
                format!(
                    "Pipeline has {} data loader nodes: {}; expected exactly one",
                    many.len(),
                    many.iter().map(|n| n.id.as_str()).collect::<Vec<_>>().join(", ")
                ),
                None,
            )],
        }
    }
}

struct ExecutableChainRule;
impl LintRule for ExecutableChainRule {
    fn name(&self) -> &str { "executable_chain" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let executables: Vec<_> = graph
            .nodes_where(|c| matches!(c, NodeConfig::Trainer(_) | NodeConfig::Script { .. }))
            .collect();
        match executables.as_slice() {
            [] => vec![error(
                self.name(),
                "Pipeline has no trainer or script node to execute",
                None,
            )],
            [terminal] => {
                let Some(loader) = graph.data_loader() else {
                    return vec![]; // DataLoaderRule reports this.
                };
                if !graph.reachable(&loader.id, &terminal.id) {
                    vec![error(
                        self.name(),
                        format!(
                            "Node '{}' is not connected to data loader '{}'",
                            terminal.id, loader.id
                        ),
                        Some(terminal.id.clone()),
                    )]
                } else {
                    vec![]
                }
            }
            many => vec![error(
                self.name(),
                format!(
                    "Pipeline has {} executable nodes: {}; expected exactly one",
                    many.len(),
                    many.iter().map(|n| n.id.as_str()).collect::<Vec<_>>().join(", ")
                ),
                None,
            )],
        }
    }
}

struct EdgeEndpointsRule;
impl LintRule for EdgeEndpointsRule {
    fn name(&self) -> &str { "edge_endpoints" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for edge in graph.all_edges() {
            for id in [&edge.source, &edge.target] {
                if graph.node(id).is_none() {
                    diags.push(error(
                        self.name(),
                        format!(
                            "Edge {} -> {} references non-existent node '{}'",
                            edge.source, edge.target, id
                        ),
                        None,
                    ));
                }
            }
        }
        diags
    }
}

struct TrainerConfigRule;
impl LintRule for TrainerConfigRule {
    fn name(&self) -> &str { "trainer_config" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in graph.nodes_where(|c| matches!(c, NodeConfig::Trainer(_))) {
            let NodeConfig::Trainer(trainer) = &node.config else { continue };
            match trainer.mode {
                TrainerMode::Load => {
                    if trainer.model_file_path.as_deref().unwrap_or("").is_empty() {
                        diags.push(error(
                            self.name(),
                            format!("Trainer '{}' is in load mode but has no model file path", node.id),
                            Some(node.id.clone()),
                        ));
                    }
                }
                TrainerMode::Train | TrainerMode::Tune => {
                    if trainer.target_column.is_empty() {
                        diags.push(error(
                            self.name(),
                            format!("Trainer '{}' has no target column configured", node.id),
                            Some(node.id.clone()),
                        ));
                    }
                    if !(trainer.test_split > 0.0 && trainer.test_split < 1.0) {
                        diags.push(error(
                            self.name(),
                            format!(
                                "Trainer '{}' test split must be between 0 and 1, got {}",
                                node.id, trainer.test_split
                            ),
                            Some(node.id.clone()),
                        ));
                    }
                }
            }
        }
        diags
    }
}

struct TuningRule;
impl LintRule for TuningRule {
    fn name(&self) -> &str { "tuning" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in graph.nodes_where(|c| matches!(c, NodeConfig::Trainer(_))) {
            let NodeConfig::Trainer(trainer) = &node.config else { continue };
            if trainer.mode != TrainerMode::Tune {
                continue;
            }
            let check = can_tune(trainer);
            if !check.valid {
                diags.push(error(
                    self.name(),
                    format!(
                        "Trainer '{}' cannot be tuned: {}",
                        node.id,
                        check.reason.unwrap_or_default()
                    ),
                    Some(node.id.clone()),
                ));
            }
            match &trainer.tuning_config {
                None => diags.push(error(
                    self.name(),
                    format!("Trainer '{}' is in tune mode but has no tuning configuration", node.id),
                    Some(node.id.clone()),
                )),
                Some(tuning) => {
                    for message in validate_tuning_config(tuning, trainer.model_type) {
                        diags.push(error(
                            self.name(),
                            format!("Trainer '{}': {}", node.id, message),
                            Some(node.id.clone()),
                        ));
                    }
                }
            }
        }
        diags
    }
}

struct SplitConfigRule;
impl LintRule for SplitConfigRule {
    fn name(&self) -> &str { "split_config" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in graph.nodes_where(|c| matches!(c, NodeConfig::DataSplit(_))) {
            let NodeConfig::DataSplit(split) = &node.config else { continue };
            if !(split.split_ratio > 0.0 && split.split_ratio < 1.0) {
                diags.push(error(
                    self.name(),
                    format!(
                        "Split '{}' ratio must be strictly between 0 and 1, got {}",
                        node.id, split.split_ratio
                    ),
                    Some(node.id.clone()),
                ));
            }
            if split.target_column.is_empty() {
                diags.push(error(
                    self.name(),
                    format!("Split '{}' has no target column configured", node.id),
                    Some(node.id.clone()),
                ));
            }
        }
        diags
    }
}

struct ExporterRule;
impl LintRule for ExporterRule {
    fn name(&self) -> &str { "exporter" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in graph.nodes_where(|c| matches!(c, NodeConfig::ModelExporter(_))) {
            let NodeConfig::ModelExporter(exporter) = &node.config else { continue };
            if exporter.output_file_name.is_empty() {
                diags.push(error(
                    self.name(),
                    format!("Exporter '{}' has no output file name", node.id),
                    Some(node.id.clone()),
                ));
            }
            let connected = graph.incoming_edges(&node.id).iter().any(|e| {
                graph
                    .node(&e.source)
                    .map(|n| {
                        n.config.produces_model()
                            || matches!(n.config, NodeConfig::Evaluator {})
                    })
                    .unwrap_or(false)
            });
            if !connected {
                diags.push(warning(
                    self.name(),
                    format!(
                        "Exporter '{}' has no edge from a trainer or evaluator and will not run",
                        node.id
                    ),
                    Some(node.id.clone()),
                ));
            }
        }
        diags
    }
}

struct DanglingConsumerRule;
impl LintRule for DanglingConsumerRule {
    fn name(&self) -> &str { "dangling_consumer" }
    fn apply(&self, graph: &PipelineGraph) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        for node in graph.nodes_where(|c| {
            matches!(c, NodeConfig::Evaluator {} | NodeConfig::Explainer {})
        }) {
            if graph.incoming_edges(&node.id).is_empty() {
                diags.push(warning(
                    self.name(),
                    format!("Node '{}' has no incoming edges and will not run", node.id),
                    Some(node.id.clone()),
                ));
            }
        }
        diags
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Run all built-in lint rules and return collected diagnostics.
pub fn validate(graph: &PipelineGraph) -> Vec<Diagnostic> {
    let rules: Vec<Box<dyn LintRule>> = vec![
        Box::new(DataLoaderRule),
        Box::new(ExecutableChainRule),
        Box::new(EdgeEndpointsRule),
        Box::new(TrainerConfigRule),
        Box::new(TuningRule),
        Box::new(SplitConfigRule),
        Box::new(ExporterRule),
        Box::new(DanglingConsumerRule),
    ];

    let mut diagnostics = Vec::new();
    for rule in &rules {
        diagnostics.extend(rule.apply(graph));
    }
    diagnostics
}

/// Run all lint rules; return `Err` if any `Error`-severity diagnostic found.
pub fn validate_or_raise(graph: &PipelineGraph) -> gantry_types::Result<Vec<Diagnostic>> {
    let diagnostics = validate(graph);
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    if !errors.is_empty() {
        let messages: Vec<_> = errors.iter().map(|d| d.message.clone()).collect();
        return Err(gantry_types::GantryError::Validation(messages.join("; ")));
    }
    Ok(diagnostics)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
