//! Run event system for observability.
//!
//! Emits [`RunEvent`]s via a [`tokio::sync::broadcast`] channel so external
//! observers (the CLI, a UI, loggers) can follow run progress without
//! coupling to the orchestrator internals. Delivery is fire-and-forget: a
//! lagging subscriber loses old events, never stalls the run.

use serde::{Deserialize, Serialize};

use gantry_runner::ScriptEvent;

/// Events emitted during a pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunEvent {
    RunStarted {
        run_id: String,
        pipeline_name: String,
        stage_count: usize,
    },
    StageStarted {
        stage: String,
        node_id: String,
    },
    Script(ScriptEvent),
    StageCompleted {
        stage: String,
        exit_code: i32,
    },
    RunCompleted {
        run_id: String,
        duration_ms: u64,
    },
    RunFailed {
        run_id: String,
        error: String,
    },
    RunCancelled {
        run_id: String,
    },
}

/// Event emitter wrapping a broadcast sender.
#[derive(Clone)]
pub struct RunEventEmitter {
    sender: tokio::sync::broadcast::Sender<RunEvent>,
}

impl RunEventEmitter {
    /// Create a new emitter with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all current subscribers.
    ///
    /// If there are no active receivers the event is silently dropped.
    pub fn emit(&self, event: RunEvent) {
        let _ = self.sender.send(event);
    }

    /// Subscribe to events. Returns a broadcast receiver.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<RunEvent> {
        self.sender.subscribe()
    }
}

impl Default for RunEventEmitter {
    fn default() -> Self {
        Self::new(256)
    }
}
