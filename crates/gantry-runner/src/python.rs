//! Python interpreter discovery.
//!
//! Resolution order: an explicitly configured path, the active virtualenv,
//! `which python3`, then a short list of conventional install locations.
//! Every candidate is verified by actually running `--version` — a path
//! that exists but cannot execute is skipped.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::{Deserialize, Serialize};

use gantry_types::{GantryError, Result};

/// A verified Python installation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonInfo {
    pub path: PathBuf,
    pub version: String,
}

const FALLBACK_PATHS: &[&str] = &[
    "/opt/homebrew/bin/python3",
    "/usr/local/bin/python3",
    "/usr/bin/python3",
];

/// Find a working interpreter, preferring an explicitly configured path.
pub fn find_python(explicit: Option<&Path>) -> Result<PythonInfo> {
    let mut candidates: Vec<PathBuf> = Vec::new();

    if let Some(path) = explicit {
        candidates.push(path.to_path_buf());
    }
    if let Ok(venv) = std::env::var("VIRTUAL_ENV") {
        candidates.push(Path::new(&venv).join("bin/python3"));
        candidates.push(Path::new(&venv).join("bin/python"));
    }
    if let Some(found) = which_python3() {
        candidates.push(found);
    }
    candidates.extend(FALLBACK_PATHS.iter().map(PathBuf::from));

    for candidate in candidates {
        if let Some(version) = probe_version(&candidate) {
            tracing::debug!(path = %candidate.display(), %version, "Found Python interpreter");
            return Ok(PythonInfo { path: candidate, version });
        }
    }

    Err(GantryError::Interpreter(
        "no python3 on PATH, in VIRTUAL_ENV, or at conventional locations".into(),
    ))
}

/// Check that `import <package>` succeeds under the given interpreter.
pub fn check_package(python: &Path, package: &str) -> bool {
    // Package names come from a fixed internal list, but keep the argument
    // inert regardless: it is passed as a single argv entry, never a shell
    // string.
    Command::new(python)
        .args(["-c", &format!("import {package}")])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn which_python3() -> Option<PathBuf> {
    let output = Command::new("which").arg("python3").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if path.is_empty() {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

fn probe_version(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    Command::new(path)
        .arg("--version")
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .replace("Python ", "")
        })
}
