//! The run orchestrator: validate, plan, execute stages strictly
//! sequentially, aggregate metrics and trials, and finalize the run record
//! on every path.
//!
//! A stage advances the run only when its process exited 0 AND emitted no
//! `error` event; otherwise the remaining stages are aborted and the run is
//! failed with the captured message. Cancellation is a distinct terminal
//! status — never reported as a failure. Store writes are best-effort: the
//! subprocess decides the run's fate, the store only records it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use gantry_runner::{RunState, ScriptEvent, ScriptRunner};
use gantry_types::{GantryError, MetricRecord, Result, RunStatus, TrialRecord};

use crate::events::{RunEvent, RunEventEmitter};
use crate::graph::PipelineGraph;
use crate::plan::{plan_run, RunPlan};
use crate::store::RunStore;
use crate::validation::validate_or_raise;

/// What a finished run looks like to the caller.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    pub metrics: Vec<MetricRecord>,
    pub trials: Vec<TrialRecord>,
    pub error: Option<String>,
}

pub struct Orchestrator {
    runner: ScriptRunner,
    store: Arc<dyn RunStore>,
    emitter: RunEventEmitter,
    active: Arc<AtomicBool>,
}

/// Releases the single-flight slot even on early returns.
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Orchestrator {
    pub fn new(runner: ScriptRunner, store: Arc<dyn RunStore>) -> Self {
        Self {
            runner,
            store,
            emitter: RunEventEmitter::default(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Subscribe to run events (stage transitions plus forwarded script
    /// events).
    pub fn events(&self) -> &RunEventEmitter {
        &self.emitter
    }

    /// Request cancellation of the active stage. The run finishes with
    /// status `Cancelled`.
    pub fn cancel(&self) -> Result<()> {
        self.runner.cancel()
    }

    /// Validate, plan, and execute a full pipeline run.
    ///
    /// Validation failures and single-flight rejection are `Err`; a run
    /// that started returns `Ok` with its terminal status, failed or not.
    pub async fn run(&self, graph: &PipelineGraph) -> Result<RunOutcome> {
        let _guard = self.claim_slot()?;
        validate_or_raise(graph)?;
        let plan = plan_run(graph)?;
        self.execute(&plan).await
    }

    /// Execute a pre-built plan. Same contract as [`run`](Self::run),
    /// minus validation.
    pub async fn run_plan(&self, plan: &RunPlan) -> Result<RunOutcome> {
        let _guard = self.claim_slot()?;
        self.execute(plan).await
    }

    fn claim_slot(&self) -> Result<ActiveGuard> {
        if self
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(GantryError::RunActive);
        }
        Ok(ActiveGuard(self.active.clone()))
    }

    async fn execute(&self, plan: &RunPlan) -> Result<RunOutcome> {
        let run_id = match self
            .store
            .create_run(&plan.pipeline_name, &plan.hyperparameters, None)
            .await
        {
            Ok(id) => id,
            Err(err) => {
                // The store is bookkeeping; the run proceeds regardless.
                tracing::warn!(%err, "Run store create_run failed");
                uuid::Uuid::new_v4().to_string()
            }
        };

        self.emitter.emit(RunEvent::RunStarted {
            run_id: run_id.clone(),
            pipeline_name: plan.pipeline_name.clone(),
            stage_count: plan.stages.len(),
        });
        tracing::info!(
            pipeline = %plan.pipeline_name,
            stages = plan.stages.len(),
            precomputed_split = plan.precomputed_split,
            "Starting run"
        );

        let start = Instant::now();
        let mut metrics: Vec<MetricRecord> = Vec::new();
        let mut trials: Vec<TrialRecord> = Vec::new();
        let mut failure: Option<String> = None;
        let mut cancelled = false;

        for stage in &plan.stages {
            let stage_name = stage.kind.as_str();
            self.emitter.emit(RunEvent::StageStarted {
                stage: stage_name.to_string(),
                node_id: stage.node_id.clone(),
            });
            tracing::info!(stage = stage_name, node = %stage.node_id, "Stage started");

            let mut handle = match self.runner.spawn(&stage.script, &plan.dataset_path).await {
                Ok(handle) => handle,
                Err(err) => {
                    failure = Some(err.to_string());
                    break;
                }
            };

            let mut stage_error: Option<String> = None;
            let mut exit_code = -1;
            while let Some(event) = handle.events.recv().await {
                match &event {
                    ScriptEvent::Error { message } => {
                        if stage_error.is_none() {
                            stage_error = Some(message.clone());
                        }
                    }
                    ScriptEvent::Metrics { data, .. } => {
                        collect_metrics(&mut metrics, data);
                    }
                    ScriptEvent::Trial { trial_number, params, score, duration_ms } => {
                        trials.push(TrialRecord {
                            trial_number: *trial_number,
                            params: params.clone(),
                            score: *score,
                            duration_ms: *duration_ms,
                        });
                    }
                    ScriptEvent::TuningComplete { best_params, best_score, .. } => {
                        metrics.push(MetricRecord::scalar("bestScore", *best_score));
                        metrics.push(MetricRecord::json("bestParams", best_params));
                    }
                    ScriptEvent::Exit { code } => {
                        exit_code = *code;
                    }
                    _ => {}
                }
                self.emitter.emit(RunEvent::Script(event));
            }

            self.emitter.emit(RunEvent::StageCompleted {
                stage: stage_name.to_string(),
                exit_code,
            });

            if self.runner.state() == RunState::Cancelled {
                cancelled = true;
                break;
            }
            if exit_code != 0 || stage_error.is_some() {
                failure = Some(stage_error.unwrap_or_else(|| {
                    format!("stage '{stage_name}' exited with code {exit_code}")
                }));
                break;
            }
            tracing::info!(stage = stage_name, "Stage completed");
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        // Finalization is unconditional: success, failure, and cancellation
        // all close out the run record exactly once.
        let status = if cancelled {
            log_store_error(self.store.fail_run(&run_id, "run cancelled").await);
            self.emitter.emit(RunEvent::RunCancelled { run_id: run_id.clone() });
            tracing::info!(run = %run_id, "Run cancelled");
            RunStatus::Cancelled
        } else if let Some(error) = &failure {
            log_store_error(self.store.fail_run(&run_id, error).await);
            self.emitter.emit(RunEvent::RunFailed {
                run_id: run_id.clone(),
                error: error.clone(),
            });
            tracing::warn!(run = %run_id, %error, "Run failed");
            RunStatus::Failed
        } else {
            // Metrics flush exactly once, on success.
            let mut flushed = metrics.clone();
            if !trials.is_empty() {
                if let Ok(value) = serde_json::to_value(&trials) {
                    flushed.push(MetricRecord::json("trials", &value));
                }
            }
            if !flushed.is_empty() {
                log_store_error(self.store.save_run_metrics(&run_id, &flushed).await);
            }
            log_store_error(self.store.complete_run(&run_id, duration_ms).await);
            self.emitter.emit(RunEvent::RunCompleted {
                run_id: run_id.clone(),
                duration_ms,
            });
            tracing::info!(run = %run_id, duration_ms, "Run completed");
            RunStatus::Completed
        };

        Ok(RunOutcome {
            run_id,
            status,
            metrics,
            trials,
            error: failure,
        })
    }
}

/// Store writes are bookkeeping; a failure is logged and the run goes on.
fn log_store_error(result: Result<()>) {
    if let Err(err) = result {
        tracing::warn!(%err, "Run store write failed");
    }
}

/// Flatten a `metrics` event payload into metric records: numbers become
/// scalars, everything else (confusion matrices, curves) JSON.
fn collect_metrics(metrics: &mut Vec<MetricRecord>, data: &serde_json::Value) {
    let Some(object) = data.as_object() else {
        metrics.push(MetricRecord::json("metrics", data));
        return;
    };
    for (name, value) in object {
        match value.as_f64() {
            Some(number) => metrics.push(MetricRecord::scalar(name, number)),
            None => metrics.push(MetricRecord::json(name, value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::{PlannedStage, StageKind};
    use crate::store::MemoryStore;
    use gantry_runner::RunnerConfig;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sh_orchestrator(dir: &TempDir, store: Arc<MemoryStore>) -> Orchestrator {
        let runner = ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("/bin/sh"),
            interpreter_args: vec![],
            workdir: dir.path().to_path_buf(),
            channel_capacity: 256,
        });
        Orchestrator::new(runner, store)
    }

    fn plan(stages: Vec<(StageKind, &str)>) -> RunPlan {
        RunPlan {
            pipeline_name: "test".into(),
            dataset_path: "unused.csv".into(),
            stages: stages
                .into_iter()
                .map(|(kind, script)| PlannedStage {
                    kind,
                    node_id: format!("node-{}", kind.as_str()),
                    script: script.to_string(),
                })
                .collect(),
            precomputed_split: false,
            hyperparameters: serde_json::json!({}),
        }
    }

    #[tokio::test]
    async fn stages_execute_sequentially_and_run_completes() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store.clone());

        // Each stage appends its name to a file; order proves sequencing.
        let p = plan(vec![
            (StageKind::Split, "echo split >> order.txt"),
            (StageKind::Train, "echo train >> order.txt"),
            (StageKind::Evaluate, "echo evaluate >> order.txt"),
        ]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let order = std::fs::read_to_string(dir.path().join("order.txt")).unwrap();
        assert_eq!(order.lines().collect::<Vec<_>>(), vec!["split", "train", "evaluate"]);

        let record = store.run(&outcome.run_id).unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.duration_ms.is_some());
    }

    #[tokio::test]
    async fn error_event_aborts_remaining_stages() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store.clone());

        let p = plan(vec![
            (
                StageKind::Train,
                r#"echo '{"type": "error", "message": "Target column missing"}'"#,
            ),
            (StageKind::Evaluate, "echo evaluate >> order.txt"),
        ]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();

        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("Target column missing"));
        // The evaluate stage never ran.
        assert!(!dir.path().join("order.txt").exists());
        // The run record was still finalized.
        let record = store.run(&outcome.run_id).unwrap();
        assert_eq!(record.status, RunStatus::Failed);
        assert_eq!(record.error.as_deref(), Some("Target column missing"));
    }

    #[tokio::test]
    async fn nonzero_exit_without_error_event_fails_with_code() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store);

        let p = plan(vec![(StageKind::Train, "exit 7"), (StageKind::Evaluate, "echo hi")]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert!(outcome.error.unwrap().contains("code 7"));
    }

    #[tokio::test]
    async fn error_event_with_zero_exit_still_fails() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store);

        let p = plan(vec![(
            StageKind::Train,
            r#"echo '{"type": "error", "message": "silent corruption"}'; exit 0"#,
        )]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("silent corruption"));
    }

    #[tokio::test]
    async fn metrics_and_trials_accumulate_and_flush_on_success() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store.clone());

        let p = plan(vec![
            (
                StageKind::Tune,
                r#"
echo '{"type": "trial", "trialNumber": 0, "params": {"max_depth": 3}, "score": 0.8}'
echo '{"type": "trial", "trialNumber": 1, "params": {"max_depth": 5}, "score": 0.9}'
echo '{"type": "tuningComplete", "bestParams": {"max_depth": 5}, "bestScore": 0.9, "totalTrials": 2}'
"#,
            ),
            (
                StageKind::Evaluate,
                r#"echo '{"type": "metrics", "modelType": "classification", "data": {"accuracy": 0.95, "confusionMatrix": [[4, 0], [1, 5]]}}'"#,
            ),
        ]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert_eq!(outcome.trials.len(), 2);

        let saved = store.metrics(&outcome.run_id);
        let names: Vec<&str> = saved.iter().map(|m| m.name.as_str()).collect();
        assert!(names.contains(&"accuracy"));
        assert!(names.contains(&"confusionMatrix"));
        assert!(names.contains(&"bestScore"));
        assert!(names.contains(&"trials"));

        let accuracy = saved.iter().find(|m| m.name == "accuracy").unwrap();
        assert_eq!(accuracy.value, Some(0.95));
        let matrix = saved.iter().find(|m| m.name == "confusionMatrix").unwrap();
        assert!(matrix.value_json.is_some());
    }

    #[tokio::test]
    async fn failed_run_preserves_metrics_in_outcome_but_does_not_flush() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store.clone());

        let p = plan(vec![(
            StageKind::Train,
            r#"
echo '{"type": "metrics", "modelType": "classification", "data": {"accuracy": 0.5}}'
exit 1
"#,
        )]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Failed);
        // Accumulated metrics stay available for diagnostics...
        assert_eq!(outcome.metrics.len(), 1);
        // ...but nothing was flushed to the store.
        assert!(store.metrics(&outcome.run_id).is_empty());
    }

    #[tokio::test]
    async fn cancellation_is_distinct_from_failure() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(sh_orchestrator(&dir, store.clone()));

        let p = plan(vec![(StageKind::Train, "sleep 30")]);

        let runner = orchestrator.clone();
        let task = tokio::spawn(async move { runner.run_plan(&p).await });

        // Wait for the stage to start, then cancel.
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        orchestrator.cancel().unwrap();

        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.status, RunStatus::Cancelled);
        assert!(outcome.error.is_none());

        // The record was finalized, not left running.
        let record = store.run(&outcome.run_id).unwrap();
        assert!(record.status.is_terminal());
    }

    #[tokio::test]
    async fn single_flight_rejects_concurrent_run() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = Arc::new(sh_orchestrator(&dir, store));

        let slow = plan(vec![(StageKind::Train, "sleep 2; echo done > first.txt")]);
        let runner = orchestrator.clone();
        let task = tokio::spawn(async move { runner.run_plan(&slow).await });

        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        let second = plan(vec![(StageKind::Train, "echo hi")]);
        let err = orchestrator.run_plan(&second).await.unwrap_err();
        assert!(matches!(err, GantryError::RunActive));

        // The in-flight run still completes.
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
        assert!(dir.path().join("first.txt").exists());
    }

    #[tokio::test]
    async fn slot_released_after_completion() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store);

        let p = plan(vec![(StageKind::Train, "echo one")]);
        orchestrator.run_plan(&p).await.unwrap();
        let again = plan(vec![(StageKind::Train, "echo two")]);
        let outcome = orchestrator.run_plan(&again).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn store_failure_does_not_change_run_status() {
        struct FailingStore;

        #[async_trait::async_trait]
        impl RunStore for FailingStore {
            async fn create_run(
                &self,
                _pipeline_name: &str,
                _hyperparameters: &serde_json::Value,
                _experiment_id: Option<&str>,
            ) -> Result<String> {
                Err(GantryError::Store("store offline".into()))
            }
            async fn complete_run(&self, _run_id: &str, _duration_ms: u64) -> Result<()> {
                Err(GantryError::Store("store offline".into()))
            }
            async fn fail_run(&self, _run_id: &str, _error: &str) -> Result<()> {
                Err(GantryError::Store("store offline".into()))
            }
            async fn save_run_metrics(
                &self,
                _run_id: &str,
                _metrics: &[MetricRecord],
            ) -> Result<()> {
                Err(GantryError::Store("store offline".into()))
            }
        }

        let dir = TempDir::new().unwrap();
        let runner = ScriptRunner::new(RunnerConfig {
            interpreter: PathBuf::from("/bin/sh"),
            interpreter_args: vec![],
            workdir: dir.path().to_path_buf(),
            channel_capacity: 256,
        });
        let orchestrator = Orchestrator::new(runner, Arc::new(FailingStore));

        let p = plan(vec![(
            StageKind::Train,
            r#"echo '{"type": "metrics", "modelType": "regression", "data": {"r2": 0.7}}'"#,
        )]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        // The subprocess succeeded; store failures are logged, not fatal.
        assert_eq!(outcome.status, RunStatus::Completed);
        assert!(!outcome.run_id.is_empty());
    }

    #[tokio::test]
    async fn events_are_emitted_in_lifecycle_order() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let orchestrator = sh_orchestrator(&dir, store);
        let mut rx = orchestrator.events().subscribe();

        let p = plan(vec![(StageKind::Train, "echo hi")]);
        let outcome = orchestrator.run_plan(&p).await.unwrap();
        assert_eq!(outcome.status, RunStatus::Completed);

        let mut saw_started = false;
        let mut saw_stage = false;
        let mut saw_completed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                RunEvent::RunStarted { .. } => saw_started = true,
                RunEvent::StageStarted { .. } => {
                    assert!(saw_started);
                    saw_stage = true;
                }
                RunEvent::RunCompleted { .. } => {
                    assert!(saw_stage);
                    saw_completed = true;
                }
                _ => {}
            }
        }
        assert!(saw_completed);
    }
}
