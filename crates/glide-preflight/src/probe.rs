//! External probes.
//!
//! Everything the checks need from the host system sits behind these
//! traits: executable discovery and invocation, interpreter import
//! probes, filesystem asset inspection, and port inspection. The suite
//! wires in the system implementations; tests wire in [`crate::fakes`].

use crate::error::ProbeError;
use async_trait::async_trait;
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Captured output of an external invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProbeOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// First line of stdout, trimmed. Version banners mostly.
    pub fn first_line(&self) -> &str {
        self.stdout.lines().next().unwrap_or("").trim()
    }
}

/// Discovers and invokes external executables.
#[async_trait]
pub trait ExecutableLocator: Send + Sync {
    /// Locate `name` on PATH.
    fn find_on_path(&self, name: &str) -> Option<PathBuf>;

    /// Run `program args...` with a bounded timeout.
    async fn invoke(
        &self,
        program: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProbeOutput, ProbeError>;
}

/// Probes whether the managed interpreter can import a module.
#[async_trait]
pub trait ImportProbe: Send + Sync {
    async fn try_import(&self, module: &str, timeout: Duration) -> Result<(), ProbeError>;
}

/// What a structured asset file is expected to contain.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Well-formed XML (SUMO configuration files).
    Xml,
    /// Non-empty Python source.
    PythonSource,
    /// Readable UTF-8 requirements manifest.
    Manifest,
}

/// Inspects filesystem assets without modifying them.
pub trait AssetInspector: Send + Sync {
    fn exists(&self, path: &Path) -> bool;

    /// Verify the asset is well-formed for its kind.
    fn validate(&self, path: &Path, kind: AssetKind) -> Result<(), ProbeError>;

    /// Whether the current process can create files under `dir`.
    fn is_writable(&self, dir: &Path) -> bool;

    /// Whether the current process can list `dir`.
    fn is_readable(&self, dir: &Path) -> bool;
}

/// Advisory port inspection.
pub trait PortInspector: Send + Sync {
    fn is_port_in_use(&self, port: u16) -> bool;
}

/// PATH-based locator invoking programs through `tokio::process`.
pub struct SystemLocator;

#[async_trait]
impl ExecutableLocator for SystemLocator {
    fn find_on_path(&self, name: &str) -> Option<PathBuf> {
        let path_var = std::env::var_os("PATH")?;
        for dir in std::env::split_paths(&path_var) {
            let candidate = dir.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    async fn invoke(
        &self,
        program: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ProbeOutput, ProbeError> {
        debug!(program = %program.display(), ?args, "invoking");

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProbeError::Spawn {
                program: program.display().to_string(),
                source,
            })?;

        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| ProbeError::Timeout)??;

        Ok(ProbeOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Import probe running `interpreter -c "import <module>"`.
pub struct PythonImportProbe {
    interpreter: PathBuf,
}

impl PythonImportProbe {
    pub fn new(interpreter: PathBuf) -> Self {
        PythonImportProbe { interpreter }
    }
}

#[async_trait]
impl ImportProbe for PythonImportProbe {
    async fn try_import(&self, module: &str, timeout: Duration) -> Result<(), ProbeError> {
        let script = format!("import {module}");
        let output = SystemLocator
            .invoke(&self.interpreter, &["-c", &script], timeout)
            .await?;

        if output.success() {
            Ok(())
        } else {
            let reason = output
                .stderr
                .lines()
                .last()
                .unwrap_or("import failed")
                .trim()
                .to_string();
            Err(ProbeError::Import {
                module: module.to_string(),
                reason,
            })
        }
    }
}

/// Asset inspector over the real filesystem.
pub struct FsAssetInspector;

impl AssetInspector for FsAssetInspector {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn validate(&self, path: &Path, kind: AssetKind) -> Result<(), ProbeError> {
        match kind {
            AssetKind::Xml => validate_xml(path),
            AssetKind::PythonSource => {
                let content = std::fs::read_to_string(path)?;
                if content.trim().is_empty() {
                    return Err(ProbeError::Validation {
                        path: path.display().to_string(),
                        reason: "file is empty".to_string(),
                    });
                }
                Ok(())
            }
            AssetKind::Manifest => {
                std::fs::read_to_string(path).map_err(|e| ProbeError::Validation {
                    path: path.display().to_string(),
                    reason: format!("not readable as UTF-8: {e}"),
                })?;
                Ok(())
            }
        }
    }

    fn is_writable(&self, dir: &Path) -> bool {
        // Probe by creating a scratch file; permission bits alone lie on
        // network filesystems and read-only mounts.
        let scratch = dir.join(".glide-write-probe");
        match std::fs::File::create(&scratch) {
            Ok(_) => {
                let _ = std::fs::remove_file(&scratch);
                true
            }
            Err(_) => false,
        }
    }

    fn is_readable(&self, dir: &Path) -> bool {
        std::fs::read_dir(dir).is_ok()
    }
}

/// Walks the whole document so truncated or mismatched markup is caught,
/// not just a bad prologue.
fn validate_xml(path: &Path) -> Result<(), ProbeError> {
    let mut reader = Reader::from_file(path).map_err(|e| ProbeError::Validation {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Eof) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                return Err(ProbeError::Validation {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        }
        buf.clear();
    }
}

/// Port inspector using a bind attempt on the loopback interface.
pub struct TcpPortInspector;

impl PortInspector for TcpPortInspector {
    fn is_port_in_use(&self, port: u16) -> bool {
        std::net::TcpListener::bind(("127.0.0.1", port)).is_err()
    }
}
