//! The script supervisor: one child process at a time, stdout decoded
//! line-by-line in arrival order, cooperative cancellation, and a
//! synthesized terminal `exit` event.
//!
//! State machine: `Idle → Starting → Running → Completed | Failed |
//! Cancelled`. Starting a run while one is live fails explicitly — nothing
//! queues, nothing gets killed implicitly.
//!
//! Backpressure: the outbound channel is bounded. Droppable events (logs,
//! progress) are discarded when the consumer lags; metrics, trials, errors,
//! and terminal events always wait for channel space so they are never
//! lost. A slow consumer therefore slows the reader task, not the child's
//! pipe — the pipe is drained into the channel, and the only events that
//! can stall the drain are the rare must-deliver ones.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Notify};

use gantry_types::{GantryError, Result};

use crate::event::{decode_line, ScriptEvent};

/// Configuration for the supervisor: which interpreter to run, with which
/// flags, and where scripts and artifacts live.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub interpreter: PathBuf,
    /// Flags placed before the script path. `-u` keeps Python's stdout
    /// unbuffered so events arrive as they are emitted.
    pub interpreter_args: Vec<String>,
    /// Working directory: the shared home of the artifact files.
    pub workdir: PathBuf,
    pub channel_capacity: usize,
}

impl RunnerConfig {
    pub fn python(interpreter: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            interpreter: interpreter.into(),
            interpreter_args: vec!["-u".to_string()],
            workdir: workdir.into(),
            channel_capacity: 256,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Starting,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunState {
    fn is_active(&self) -> bool {
        matches!(self, RunState::Starting | RunState::Running)
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<RunState>,
    cancel_requested: Mutex<bool>,
    /// The active process's cancel signal. Fresh per spawn so a permit from
    /// a finished run can never terminate the next one.
    cancel: Mutex<Option<Arc<Notify>>>,
}

/// Supervises one generated script at a time.
pub struct ScriptRunner {
    config: RunnerConfig,
    shared: Arc<Shared>,
}

/// A live stage execution. Receiving from `events` yields decoded events in
/// arrival order; the final event is always `Exit { code }`.
#[derive(Debug)]
pub struct StageHandle {
    pub events: mpsc::Receiver<ScriptEvent>,
}

impl ScriptRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self {
            config,
            shared: Arc::new(Shared {
                state: Mutex::new(RunState::Idle),
                cancel_requested: Mutex::new(false),
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn state(&self) -> RunState {
        *self.shared.state.lock().expect("state lock poisoned")
    }

    /// Request cancellation of the active process. Returns an error when
    /// nothing is running. The transition to `Cancelled` happens regardless
    /// of whether the child acknowledges the signal.
    pub fn cancel(&self) -> Result<()> {
        {
            let state = self.shared.state.lock().expect("state lock poisoned");
            if !state.is_active() {
                return Err(GantryError::NoActiveRun);
            }
        }
        *self.shared.cancel_requested.lock().expect("cancel lock poisoned") = true;
        // notify_one stores a permit, so a cancel that lands before the wait
        // task polls is not lost.
        if let Some(cancel) = self.shared.cancel.lock().expect("cancel lock poisoned").as_ref() {
            cancel.notify_one();
        }
        Ok(())
    }

    /// Start the given program text as a child process.
    ///
    /// Fails with [`GantryError::RunActive`] while another process is live.
    pub async fn spawn(&self, script: &str, dataset_path: &str) -> Result<StageHandle> {
        {
            let mut state = self.shared.state.lock().expect("state lock poisoned");
            if state.is_active() {
                return Err(GantryError::RunActive);
            }
            *state = RunState::Starting;
        }
        *self.shared.cancel_requested.lock().expect("cancel lock poisoned") = false;

        match self.spawn_inner(script, dataset_path).await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                *self.shared.state.lock().expect("state lock poisoned") = RunState::Idle;
                Err(err)
            }
        }
    }

    async fn spawn_inner(&self, script: &str, dataset_path: &str) -> Result<StageHandle> {
        let scripts_dir = self.config.workdir.join("scripts");
        tokio::fs::create_dir_all(&scripts_dir).await?;
        let script_path = scripts_dir.join(format!("script_{}.py", uuid::Uuid::new_v4()));
        tokio::fs::write(&script_path, script).await?;

        let mut cmd = tokio::process::Command::new(&self.config.interpreter);
        cmd.args(&self.config.interpreter_args)
            .arg(&script_path)
            .arg(dataset_path)
            .current_dir(&self.config.workdir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        // On Unix, a fresh process group lets cancellation signal the whole
        // tree, not just the interpreter.
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn()?;
        let pid = child.id();
        tracing::debug!(?pid, script = %script_path.display(), "Spawned stage process");

        *self.shared.state.lock().expect("state lock poisoned") = RunState::Running;

        let (tx, rx) = mpsc::channel(self.config.channel_capacity);

        let stdout = child.stdout.take().expect("stdout piped");
        let stderr = child.stderr.take().expect("stderr piped");

        let stdout_task = tokio::spawn(read_stdout(stdout, tx.clone()));
        let stderr_task = tokio::spawn(read_stderr(stderr, tx.clone()));

        let cancel = Arc::new(Notify::new());
        *self.shared.cancel.lock().expect("cancel lock poisoned") = Some(cancel.clone());
        // A cancel that raced the spawn (between Starting and here) set the
        // flag but had no Notify to poke yet.
        if *self.shared.cancel_requested.lock().expect("cancel lock poisoned") {
            cancel.notify_one();
        }

        let shared = self.shared.clone();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status,
                _ = cancel.notified() => {
                    terminate(&mut child, pid).await;
                    child.wait().await
                }
            };

            // Drain output completely before synthesizing the exit event.
            let _ = stdout_task.await;
            let _ = stderr_task.await;

            let cancelled = *shared.cancel_requested.lock().expect("cancel lock poisoned");
            let mut code = match status {
                Ok(status) => status.code().unwrap_or(-1),
                Err(_) => -1,
            };
            if cancelled && code == 0 {
                // A child that wins the race and exits cleanly still must
                // not report a successful run after cancellation.
                code = 130;
            }

            let _ = tokio::fs::remove_file(&script_path).await;

            let next = if cancelled {
                RunState::Cancelled
            } else if code == 0 {
                RunState::Completed
            } else {
                RunState::Failed
            };
            *shared.cancel.lock().expect("cancel lock poisoned") = None;
            *shared.state.lock().expect("state lock poisoned") = next;
            tracing::debug!(?code, state = ?next, "Stage process finished");

            let _ = tx.send(ScriptEvent::Exit { code }).await;
        });

        Ok(StageHandle { events: rx })
    }
}

/// Forward an event respecting the drop policy: droppable events are
/// discarded when the channel is full, everything else waits.
async fn forward(tx: &mpsc::Sender<ScriptEvent>, event: ScriptEvent) {
    if event.is_droppable() {
        let _ = tx.try_send(event);
    } else {
        let _ = tx.send(event).await;
    }
}

async fn read_stdout(stdout: tokio::process::ChildStdout, tx: mpsc::Sender<ScriptEvent>) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(event) = decode_line(&line) {
            forward(&tx, event).await;
        }
    }
}

/// stderr is forwarded as log lines, not `error` events: an `error` event
/// fails the stage, and Python libraries write warnings to stderr freely.
/// Real failures already emit `error` on stdout plus a non-zero exit.
async fn read_stderr(stderr: tokio::process::ChildStderr, tx: mpsc::Sender<ScriptEvent>) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        forward(&tx, ScriptEvent::Log { message: line }).await;
    }
}

/// SIGTERM the process group, give it two seconds, then force kill.
async fn terminate(child: &mut tokio::process::Child, pid: Option<u32>) {
    #[cfg(unix)]
    {
        if let Some(pid) = pid {
            unsafe {
                libc::kill(-(pid as i32), libc::SIGTERM);
            }
        }
        tokio::select! {
            _ = child.wait() => {}
            _ = tokio::time::sleep(std::time::Duration::from_secs(2)) => {
                let _ = child.kill().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        let _ = child.kill().await;
    }
}
