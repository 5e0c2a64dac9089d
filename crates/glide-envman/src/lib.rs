//! GLIDE Envman - isolated dependency environments for the backend
//!
//! Manages the lifecycle of the `.venv` the corridor backend runs in:
//! detect, create, destroy, activate. Activation resolves the
//! environment's interpreter and bin directory for the current process
//! instead of mutating any shell state; every downstream probe and
//! launch goes through the resolved interpreter.
//!
//! Destroy-then-create is always safe to re-attempt, so an interrupted
//! creation is recoverable with a clean request.

pub mod error;
pub mod install;

pub use error::{EnvError, Result};
pub use install::{manifest_digest, DependencyOutcome, PipInstaller, FALLBACK_PACKAGES};

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

const CREATE_TIMEOUT: Duration = Duration::from_secs(180);

/// A (possibly not yet created) virtualenv directory.
#[derive(Debug, Clone)]
pub struct VirtualEnv {
    dir: PathBuf,
}

/// An activated environment: resolved paths into a live virtualenv.
#[derive(Debug, Clone)]
pub struct ActivatedEnv {
    pub dir: PathBuf,
    pub bin_dir: PathBuf,
    pub python: PathBuf,
}

impl VirtualEnv {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        VirtualEnv { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn bin_dir(&self) -> PathBuf {
        self.dir.join("bin")
    }

    fn python(&self) -> PathBuf {
        self.bin_dir().join("python")
    }

    /// Whether a usable environment is present.
    ///
    /// Requires both the venv marker and the interpreter, so a
    /// half-created directory reads as absent and a subsequent create
    /// fills it in.
    pub fn exists(&self) -> bool {
        self.dir.join("pyvenv.cfg").is_file() && self.python().is_file()
    }

    /// Create the environment with `python -m venv`.
    pub async fn create(&self, python: &Path) -> Result<()> {
        info!(dir = %self.dir.display(), "creating virtualenv");

        let child = Command::new(python)
            .args(["-m", "venv"])
            .arg(&self.dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|_| EnvError::PythonNotFound)?;

        let output = tokio::time::timeout(CREATE_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| EnvError::CreateFailed {
                path: self.dir.display().to_string(),
                reason: format!("timed out after {} seconds", CREATE_TIMEOUT.as_secs()),
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnvError::CreateFailed {
                path: self.dir.display().to_string(),
                reason: stderr.lines().last().unwrap_or("venv failed").trim().to_string(),
            });
        }

        Ok(())
    }

    /// Remove the environment directory. Absent is not an error, so a
    /// clean request is idempotent.
    pub fn destroy(&self) -> Result<()> {
        if !self.dir.exists() {
            debug!(dir = %self.dir.display(), "no environment to remove");
            return Ok(());
        }
        info!(dir = %self.dir.display(), "removing virtualenv");
        std::fs::remove_dir_all(&self.dir).map_err(|source| EnvError::DestroyFailed {
            path: self.dir.display().to_string(),
            source,
        })
    }

    /// Resolve the environment's interpreter for this process.
    pub fn activate(&self) -> Result<ActivatedEnv> {
        let python = self.python();
        if !python.is_file() {
            return Err(EnvError::ActivateFailed {
                path: self.dir.display().to_string(),
            });
        }
        Ok(ActivatedEnv {
            dir: self.dir.clone(),
            bin_dir: self.bin_dir(),
            python,
        })
    }
}
