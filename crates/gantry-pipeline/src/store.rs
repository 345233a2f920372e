//! The run store seam: the external datastore the orchestrator reports to.
//!
//! Store calls are best-effort bookkeeping. The run's pass/fail status is
//! determined by the subprocess, never by whether a store write succeeded —
//! the orchestrator logs store failures and moves on.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use gantry_types::{GantryError, MetricRecord, Result, RunRecord, RunStatus};

#[async_trait]
pub trait RunStore: Send + Sync {
    /// Create a run record; returns the run id.
    async fn create_run(
        &self,
        pipeline_name: &str,
        hyperparameters: &serde_json::Value,
        experiment_id: Option<&str>,
    ) -> Result<String>;

    async fn complete_run(&self, run_id: &str, duration_ms: u64) -> Result<()>;

    async fn fail_run(&self, run_id: &str, error: &str) -> Result<()>;

    async fn save_run_metrics(&self, run_id: &str, metrics: &[MetricRecord]) -> Result<()>;
}

/// In-memory store for tests and the CLI.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    runs: HashMap<String, RunRecord>,
    metrics: HashMap<String, Vec<MetricRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn run(&self, run_id: &str) -> Option<RunRecord> {
        self.inner.lock().expect("store lock poisoned").runs.get(run_id).cloned()
    }

    pub fn metrics(&self, run_id: &str) -> Vec<MetricRecord> {
        self.inner
            .lock()
            .expect("store lock poisoned")
            .metrics
            .get(run_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn run_count(&self) -> usize {
        self.inner.lock().expect("store lock poisoned").runs.len()
    }
}

#[async_trait]
impl RunStore for MemoryStore {
    async fn create_run(
        &self,
        pipeline_name: &str,
        _hyperparameters: &serde_json::Value,
        _experiment_id: Option<&str>,
    ) -> Result<String> {
        let record = RunRecord::new(pipeline_name);
        let id = record.id.clone();
        self.inner
            .lock()
            .expect("store lock poisoned")
            .runs
            .insert(id.clone(), record);
        Ok(id)
    }

    async fn complete_run(&self, run_id: &str, duration_ms: u64) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let record = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| GantryError::Store(format!("unknown run '{run_id}'")))?;
        record.status = RunStatus::Completed;
        record.duration_ms = Some(duration_ms);
        Ok(())
    }

    async fn fail_run(&self, run_id: &str, error: &str) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        let record = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| GantryError::Store(format!("unknown run '{run_id}'")))?;
        record.status = RunStatus::Failed;
        record.error = Some(error.to_string());
        Ok(())
    }

    async fn save_run_metrics(&self, run_id: &str, metrics: &[MetricRecord]) -> Result<()> {
        let mut inner = self.inner.lock().expect("store lock poisoned");
        if !inner.runs.contains_key(run_id) {
            return Err(GantryError::Store(format!("unknown run '{run_id}'")));
        }
        inner
            .metrics
            .entry(run_id.to_string())
            .or_default()
            .extend_from_slice(metrics);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_complete_round_trip() {
        let store = MemoryStore::new();
        let id = store
            .create_run("iris", &serde_json::json!({}), None)
            .await
            .unwrap();
        assert_eq!(store.run(&id).unwrap().status, RunStatus::Running);

        store.complete_run(&id, 1234).await.unwrap();
        let record = store.run(&id).unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert_eq!(record.duration_ms, Some(1234));
    }

    #[tokio::test]
    async fn fail_records_error_message() {
        let store = MemoryStore::new();
        let id = store
            .create_run("iris", &serde_json::json!({}), None)
            .await
            .unwrap();
        store.fail_run(&id, "target column missing").await.unwrap();
        let record = store.run(&id).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("target column missing"));
    }

    #[tokio::test]
    async fn metrics_accumulate_per_run() {
        let store = MemoryStore::new();
        let id = store
            .create_run("iris", &serde_json::json!({}), None)
            .await
            .unwrap();
        store
            .save_run_metrics(&id, &[MetricRecord::scalar("accuracy", 0.9)])
            .await
            .unwrap();
        store
            .save_run_metrics(&id, &[MetricRecord::scalar("f1", 0.88)])
            .await
            .unwrap();
        let metrics = store.metrics(&id);
        assert_eq!(metrics.len(), 2);
    }

    #[tokio::test]
    async fn unknown_run_is_a_store_error() {
        let store = MemoryStore::new();
        assert!(store.complete_run("nope", 1).await.is_err());
        assert!(store.fail_run("nope", "x").await.is_err());
        assert!(store.save_run_metrics("nope", &[]).await.is_err());
    }
}
