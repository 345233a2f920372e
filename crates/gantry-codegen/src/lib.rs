//! Python code generation for Gantry pipeline stages.
//!
//! One pure generator per stage kind: each takes a node configuration (plus
//! knowledge of upstream artifacts) and returns program text that reads and
//! writes the well-known artifacts and speaks the line protocol decoded by
//! `gantry-runner`. The search-space validator lives here too, because the
//! grid enumeration it uses is the same one the tuning generator renders
//! into the grid-sampler dictionary.

pub mod common;
pub mod evaluate;
pub mod explain;
pub mod export;
pub mod py;
pub mod search;
pub mod split;
pub mod train;
pub mod tune;

pub use common::{SplitSource, MODEL_ARTIFACT, MODEL_INFO_ARTIFACT, SPLIT_ARTIFACT};
pub use evaluate::{auto_evaluate_script, evaluate_script};
pub use explain::explain_script;
pub use export::export_script;
pub use search::{
    can_tune, enumerate_param, format_grid_warning, grid_combinations, validate_param_spec,
    validate_tuning_config, TuneCheck,
};
pub use split::split_script;
pub use train::{load_model_script, train_script};
pub use tune::tune_script;
