//! Interpreter registry with stale-registration protection.
//!
//! Interpreter discovery can be re-triggered while an earlier detection is
//! still in flight (the user changes the configured path twice, quickly).
//! Each update claims a generation number; a completion whose generation is
//! no longer current is discarded, so the registry can never be overwritten
//! by a slower, older detection racing a newer one. The generation check
//! and the registration are one atomic step under the same lock.
//!
//! This is an injected object, not a process-wide singleton, so tests can
//! construct as many as they like.

use std::sync::Mutex;

use crate::python::PythonInfo;

#[derive(Debug, Default)]
struct RegistryInner {
    generation: u64,
    interpreter: Option<PythonInfo>,
}

#[derive(Debug, Default)]
pub struct InterpreterRegistry {
    inner: Mutex<RegistryInner>,
}

impl InterpreterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a new generation. Any update started earlier becomes stale.
    pub fn begin_update(&self) -> u64 {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.generation += 1;
        inner.generation
    }

    /// Complete an update started with [`begin_update`]. Returns `false`
    /// (and registers nothing) when a newer update has since been claimed.
    ///
    /// [`begin_update`]: InterpreterRegistry::begin_update
    pub fn complete_update(&self, generation: u64, interpreter: PythonInfo) -> bool {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if generation != inner.generation {
            tracing::debug!(
                stale = generation,
                current = inner.generation,
                "Discarding stale interpreter registration"
            );
            return false;
        }
        inner.interpreter = Some(interpreter);
        true
    }

    /// The currently registered interpreter, if any.
    pub fn current(&self) -> Option<PythonInfo> {
        self.inner.lock().expect("registry lock poisoned").interpreter.clone()
    }

    /// Drop the registered interpreter (e.g. the configured path was
    /// cleared). Claims a generation so in-flight updates become stale.
    pub fn clear(&self) -> u64 {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        inner.generation += 1;
        inner.interpreter = None;
        inner.generation
    }
}
