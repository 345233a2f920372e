//! Shared types and errors for the Gantry pipeline engine.
//!
//! This crate provides the foundational types used across all other Gantry
//! crates:
//! - `GantryError` — unified error taxonomy
//! - node configuration (`NodeConfig`, `Edge`) for the editor graph
//! - model knowledge (`ModelType`, `ProblemType`, scoring metrics)
//! - hyperparameter search types (`ParamSpec`, `SearchSpace`, `TuningConfig`)
//! - run bookkeeping (`RunRecord`, `MetricRecord`, `TrialRecord`)

pub mod config;
pub mod model;
pub mod params;
pub mod run;

pub use config::{
    DataSplitConfig, Edge, ExportFormat, ExporterConfig, NodeConfig, TrainerConfig, TrainerMode,
};
pub use model::{ModelType, ProblemType};
pub use params::{
    objective_direction, Distribution, ObjectiveDirection, ParamSpec, Sampler, SearchSpace,
    TuningConfig,
};
pub use run::{MetricRecord, RunRecord, RunStatus, TrialRecord};

/// Unified error type for all Gantry subsystems.
#[derive(Debug, thiserror::Error)]
pub enum GantryError {
    // === Graph / configuration errors ===
    #[error("Pipeline validation failed: {0}")]
    Validation(String),

    #[error("Generator for stage '{stage}' failed: {message}")]
    Generator { stage: String, message: String },

    #[error("Node '{node}' cannot be executed: {message}")]
    UnsupportedNode { node: String, message: String },

    // === Interpreter / process errors ===
    #[error("No usable Python interpreter found: {0}")]
    Interpreter(String),

    #[error("A run is already active; cancel or await it first")]
    RunActive,

    #[error("No run is active")]
    NoActiveRun,

    #[error("Stage '{stage}' failed: {message}")]
    StageFailed { stage: String, message: String },

    #[error("Run cancelled")]
    Cancelled,

    // === Store ===
    #[error("Run store error: {0}")]
    Store(String),

    // === Generic ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl GantryError {
    /// Returns `true` if the error is permanent and retrying will not help.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GantryError::Validation(_)
                | GantryError::Generator { .. }
                | GantryError::UnsupportedNode { .. }
        )
    }

    /// Returns `true` for the distinct cancellation outcome, which must not
    /// be reported as a failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, GantryError::Cancelled)
    }
}

/// A convenience alias for `Result<T, GantryError>`.
pub type Result<T> = std::result::Result<T, GantryError>;
