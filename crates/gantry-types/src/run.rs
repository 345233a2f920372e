//! Run bookkeeping: the record the orchestrator creates at run start and
//! finalizes exactly once at run end, plus collected metric and trial rows.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub id: String,
    pub pipeline_name: String,
    pub status: RunStatus,
    pub started_at: chrono::DateTime<chrono::Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunRecord {
    pub fn new(pipeline_name: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            pipeline_name: pipeline_name.into(),
            status: RunStatus::Running,
            started_at: chrono::Utc::now(),
            duration_ms: None,
            error: None,
        }
    }
}

/// One persisted metric. Scalar metrics use `value`; structured payloads
/// (confusion matrices, curves) are stored as JSON text in `value_json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_json: Option<String>,
}

impl MetricRecord {
    pub fn scalar(name: impl Into<String>, value: f64) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            value_json: None,
        }
    }

    pub fn json(name: impl Into<String>, value: &serde_json::Value) -> Self {
        Self {
            name: name.into(),
            value: None,
            value_json: Some(value.to_string()),
        }
    }
}

/// One completed hyperparameter-search trial.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialRecord {
    pub trial_number: u32,
    pub params: serde_json::Value,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_record_is_running() {
        let record = RunRecord::new("iris-pipeline");
        assert_eq!(record.status, RunStatus::Running);
        assert!(!record.status.is_terminal());
        assert!(record.duration_ms.is_none());
        assert!(record.error.is_none());
        assert!(!record.id.is_empty());
    }

    #[test]
    fn terminal_statuses() {
        assert!(RunStatus::Completed.is_terminal());
        assert!(RunStatus::Failed.is_terminal());
        assert!(RunStatus::Cancelled.is_terminal());
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&RunStatus::Cancelled).unwrap(),
            "\"cancelled\""
        );
    }

    #[test]
    fn metric_record_constructors() {
        let scalar = MetricRecord::scalar("accuracy", 0.97);
        assert_eq!(scalar.value, Some(0.97));
        assert!(scalar.value_json.is_none());

        let matrix = serde_json::json!([[5, 0], [1, 4]]);
        let json = MetricRecord::json("confusionMatrix", &matrix);
        assert!(json.value.is_none());
        assert_eq!(json.value_json.as_deref(), Some("[[5,0],[1,4]]"));
    }

    #[test]
    fn trial_record_round_trip() {
        let trial = TrialRecord {
            trial_number: 3,
            params: serde_json::json!({"n_estimators": 100}),
            score: 0.91,
            duration_ms: Some(420),
        };
        let json = serde_json::to_string(&trial).unwrap();
        assert!(json.contains("\"trialNumber\":3"));
        let back: TrialRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trial_number, 3);
        assert_eq!(back.duration_ms, Some(420));
    }
}
