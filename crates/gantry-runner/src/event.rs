//! The script event protocol: one JSON message per child stdout line.
//!
//! Decoding is per-line and infallible. A line that parses as a recognized
//! message becomes a typed event; a JSON object with an unrecognized
//! discriminator is ignored (forward compatibility — a newer generator must
//! not break an older host); anything else is a plain log line. `exit` is
//! never produced by the child: the supervisor synthesizes it from the real
//! process exit status after output is fully drained, so it is always the
//! terminal event a listener observes.

use serde::{Deserialize, Serialize};

/// Events emitted by a generated program (plus the synthesized `exit`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ScriptEvent {
    #[serde(rename = "log")]
    Log { message: String },
    #[serde(rename = "progress")]
    Progress { current: u32, total: u32 },
    #[serde(rename = "error")]
    Error { message: String },
    #[serde(rename = "metrics")]
    Metrics {
        #[serde(rename = "modelType")]
        model_type: String,
        data: serde_json::Value,
    },
    #[serde(rename = "trial")]
    Trial {
        #[serde(rename = "trialNumber")]
        trial_number: u32,
        params: serde_json::Value,
        score: f64,
        #[serde(rename = "durationMs")]
        duration_ms: Option<u64>,
    },
    #[serde(rename = "tuningComplete")]
    TuningComplete {
        #[serde(rename = "bestParams")]
        best_params: serde_json::Value,
        #[serde(rename = "bestScore")]
        best_score: f64,
        #[serde(rename = "totalTrials")]
        total_trials: u32,
        #[serde(rename = "durationMs")]
        duration_ms: Option<u64>,
    },
    #[serde(rename = "explainProgress")]
    ExplainProgress {
        stage: String,
        #[serde(rename = "percentComplete")]
        percent_complete: u32,
    },
    #[serde(rename = "featureImportance")]
    FeatureImportance { data: serde_json::Value },
    #[serde(rename = "shapData")]
    ShapData { data: serde_json::Value },
    #[serde(rename = "partialDependence")]
    PartialDependence { data: serde_json::Value },
    #[serde(rename = "explainMetadata")]
    ExplainMetadata { data: serde_json::Value },
    #[serde(rename = "explainComplete")]
    ExplainComplete {
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
    #[serde(rename = "complete")]
    Complete,
    #[serde(rename = "exit")]
    Exit { code: i32 },
}

impl ScriptEvent {
    /// Events that may be dropped under backpressure. Everything else —
    /// metrics, trials, errors, terminal events — must be delivered.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            ScriptEvent::Log { .. }
                | ScriptEvent::Progress { .. }
                | ScriptEvent::ExplainProgress { .. }
        )
    }
}

/// Message types the codec recognizes. Used to tell "a newer generator sent
/// something we don't know" (ignore) apart from "a known message failed to
/// parse" (forward as a log line).
const KNOWN_TYPES: &[&str] = &[
    "log",
    "progress",
    "error",
    "metrics",
    "trial",
    "tuningComplete",
    "explainProgress",
    "featureImportance",
    "shapData",
    "partialDependence",
    "explainMetadata",
    "explainComplete",
    "complete",
    "exit",
];

/// Decode one line of child output.
///
/// Returns `None` for structured messages with an unrecognized type; these
/// are intentionally ignored, never fatal. `exit` is stripped here as well:
/// only the supervisor may produce it.
pub fn decode_line(line: &str) -> Option<ScriptEvent> {
    let trimmed = line.trim();
    if trimmed.starts_with('{') {
        if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
            if let Some(event_type) = value.get("type").and_then(|t| t.as_str()) {
                if !KNOWN_TYPES.contains(&event_type) {
                    return None;
                }
                // The child must not speak for the process's exit status.
                if event_type == "exit" {
                    return None;
                }
                if let Ok(event) = serde_json::from_value::<ScriptEvent>(value) {
                    return Some(event);
                }
                // Recognized wrapper, unparseable payload: plain text.
            }
        }
    }
    if trimmed.is_empty() {
        return None;
    }
    Some(ScriptEvent::Log {
        message: line.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_log_event() {
        let event = decode_line(r#"{"type": "log", "message": "hello"}"#).unwrap();
        assert_eq!(event, ScriptEvent::Log { message: "hello".into() });
    }

    #[test]
    fn decodes_progress_event() {
        let event = decode_line(r#"{"type": "progress", "current": 2, "total": 4}"#).unwrap();
        assert_eq!(event, ScriptEvent::Progress { current: 2, total: 4 });
    }

    #[test]
    fn decodes_metrics_event() {
        let line = r#"{"type": "metrics", "modelType": "classification", "data": {"accuracy": 0.97}}"#;
        match decode_line(line).unwrap() {
            ScriptEvent::Metrics { model_type, data } => {
                assert_eq!(model_type, "classification");
                assert_eq!(data["accuracy"], 0.97);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_trial_event_with_optional_duration() {
        let line = r#"{"type": "trial", "trialNumber": 3, "params": {"max_depth": 4}, "score": 0.91}"#;
        match decode_line(line).unwrap() {
            ScriptEvent::Trial { trial_number, score, duration_ms, .. } => {
                assert_eq!(trial_number, 3);
                assert_eq!(score, 0.91);
                assert_eq!(duration_ms, None);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_tuning_complete() {
        let line = r#"{"type": "tuningComplete", "bestParams": {"C": 1.0}, "bestScore": 0.95, "totalTrials": 30, "durationMs": 1200}"#;
        match decode_line(line).unwrap() {
            ScriptEvent::TuningComplete { best_score, total_trials, .. } => {
                assert_eq!(best_score, 0.95);
                assert_eq!(total_trials, 30);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn decodes_explain_progress() {
        let line = r#"{"type": "explainProgress", "stage": "shap", "percentComplete": 50}"#;
        assert_eq!(
            decode_line(line).unwrap(),
            ScriptEvent::ExplainProgress { stage: "shap".into(), percent_complete: 50 }
        );
    }

    #[test]
    fn plain_text_becomes_log() {
        let event = decode_line("Fitting 5 folds for each of 10 candidates").unwrap();
        match event {
            ScriptEvent::Log { message } => {
                assert_eq!(message, "Fitting 5 folds for each of 10 candidates")
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn malformed_json_becomes_log_not_error() {
        let event = decode_line(r#"{"type": "metrics", "modelType": }"#).unwrap();
        assert!(matches!(event, ScriptEvent::Log { .. }));
    }

    #[test]
    fn unrecognized_structured_type_is_ignored() {
        assert_eq!(decode_line(r#"{"type": "dataProfile", "data": {}}"#), None);
        assert_eq!(decode_line(r#"{"type": "futureEvent"}"#), None);
    }

    #[test]
    fn recognized_type_with_wrong_fields_falls_back_to_log() {
        // Structured, recognized discriminator, but missing required fields:
        // forwarded as plain text rather than silently swallowed.
        let line = r#"{"type": "progress", "current": 1}"#;
        match decode_line(line).unwrap() {
            ScriptEvent::Log { message } => assert_eq!(message, line),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn child_cannot_forge_exit() {
        assert_eq!(decode_line(r#"{"type": "exit", "code": 0}"#), None);
    }

    #[test]
    fn empty_lines_are_dropped() {
        assert_eq!(decode_line(""), None);
        assert_eq!(decode_line("   "), None);
    }

    #[test]
    fn droppable_classification() {
        assert!(ScriptEvent::Log { message: "x".into() }.is_droppable());
        assert!(ScriptEvent::Progress { current: 1, total: 2 }.is_droppable());
        assert!(!ScriptEvent::Error { message: "x".into() }.is_droppable());
        assert!(!ScriptEvent::Complete.is_droppable());
        assert!(!ScriptEvent::Exit { code: 0 }.is_droppable());
        assert!(
            !ScriptEvent::Metrics { model_type: "classification".into(), data: serde_json::json!({}) }
                .is_droppable()
        );
    }

    #[test]
    fn round_trip_serialization_uses_camel_case_tags() {
        let event = ScriptEvent::TuningComplete {
            best_params: serde_json::json!({"max_depth": 4}),
            best_score: 0.9,
            total_trials: 10,
            duration_ms: Some(100),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"tuningComplete\""));
        assert!(json.contains("\"bestParams\""));
        let back: ScriptEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }
}
