//! Generator for the data-split stage.
//!
//! The split stage computes train/test row indices once and persists them to
//! the split artifact; downstream train/tune/evaluate stages of the same run
//! then use the precomputed-split variants so every stage sees identical
//! rows.

use std::fmt::Write as _;

use gantry_types::DataSplitConfig;

use crate::common::{self, SPLIT_ARTIFACT};
use crate::py;

pub fn split_script(config: &DataSplitConfig) -> String {
    let test_size = 1.0 - config.split_ratio;

    let mut s = common::prologue(&[
        "import numpy as np",
        "import pandas as pd",
        "from sklearn.model_selection import train_test_split",
    ]);
    s.push_str(common::load_dataset());
    s.push_str(&common::bind_target(&config.target_column));

    s.push_str("\nemit({\"type\": \"progress\", \"current\": 1, \"total\": 2})\n");
    s.push_str("indices = np.arange(len(df))\n");
    let stratify = if config.stratify { "y" } else { "None" };
    let _ = writeln!(
        s,
        "train_idx, test_idx = train_test_split(\n    indices, test_size={}, random_state={}, stratify={}\n)",
        py::float_literal(test_size),
        config.random_state,
        stratify
    );

    let _ = writeln!(s, "write_json({}, {{", py::quote(SPLIT_ARTIFACT));
    s.push_str("    \"trainIndices\": [int(i) for i in train_idx],\n");
    s.push_str("    \"testIndices\": [int(i) for i in test_idx],\n");
    let _ = writeln!(s, "    \"splitRatio\": {},", py::float_literal(config.split_ratio));
    let _ = writeln!(s, "    \"randomState\": {},", config.random_state);
    let _ = writeln!(s, "    \"stratify\": {},", if config.stratify { "True" } else { "False" });
    s.push_str("    \"targetColumn\": target_column,\n})\n");

    s.push_str(
        "emit({\"type\": \"log\", \"message\": \"Split \" + str(len(train_idx)) + \" train / \" + str(len(test_idx)) + \" test rows\"})\n",
    );
    s.push_str("emit({\"type\": \"progress\", \"current\": 2, \"total\": 2})\n");
    s.push_str(common::epilogue());
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DataSplitConfig {
        DataSplitConfig {
            split_ratio: 0.8,
            random_state: 7,
            stratify: true,
            target_column: "species".into(),
        }
    }

    #[test]
    fn split_ratio_becomes_test_size() {
        let script = split_script(&config());
        assert!(script.contains("test_size=0.2"), "got:\n{script}");
        assert!(script.contains("random_state=7"));
        assert!(script.contains("stratify=y"));
    }

    #[test]
    fn writes_split_artifact_with_metadata() {
        let script = split_script(&config());
        assert!(script.contains("write_json(\"split_indices.json\""));
        assert!(script.contains("\"trainIndices\""));
        assert!(script.contains("\"testIndices\""));
        assert!(script.contains("\"splitRatio\": 0.8"));
        assert!(script.contains("\"stratify\": True"));
    }

    #[test]
    fn unstratified_split_passes_none() {
        let mut c = config();
        c.stratify = false;
        let script = split_script(&c);
        assert!(script.contains("stratify=None"));
        assert!(script.contains("\"stratify\": False"));
    }

    #[test]
    fn hostile_target_column_stays_inside_literal() {
        let mut c = config();
        c.target_column = "y\"\nimport os #".into();
        let script = split_script(&c);
        assert!(script.contains(r#"target_column = "y\"\nimport os #""#));
    }

    #[test]
    fn ends_with_complete_event() {
        let script = split_script(&config());
        assert!(script.trim_end().ends_with(r#"emit({"type": "complete"})"#));
    }
}
