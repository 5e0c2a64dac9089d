//! Dependency installation into the managed environment.
//!
//! Installs from `requirements.txt` when it exists, otherwise from the
//! minimal package set the backend cannot start without. A digest of
//! the manifest is recorded inside the environment after a successful
//! install so an unchanged manifest skips the pip round-trip.

use crate::error::{EnvError, Result};
use crate::ActivatedEnv;
use async_trait::async_trait;
use glide_preflight::PackageInstaller;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Installed when no manifest is present; the imports `app_glide.py`
/// cannot start without.
pub const FALLBACK_PACKAGES: [&str; 3] = ["fastapi", "uvicorn", "numpy"];

const PIP_TIMEOUT: Duration = Duration::from_secs(600);
const MARKER_FILE: &str = ".requirements-digest";

/// How `ensure_dependencies` resolved the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyOutcome {
    /// Manifest digest matched the recorded marker; nothing installed.
    AlreadyCurrent,
    InstalledFromManifest,
    /// Manifest absent; fallback package set installed instead.
    InstalledFallback,
}

/// pip driver bound to one activated environment.
pub struct PipInstaller {
    python: PathBuf,
    env_dir: PathBuf,
}

impl PipInstaller {
    pub fn new(env: &ActivatedEnv) -> Self {
        PipInstaller {
            python: env.python.clone(),
            env_dir: env.dir.clone(),
        }
    }

    /// Upgrade pip itself before installing anything.
    pub async fn upgrade_pip(&self) -> Result<()> {
        self.run_pip(&["install", "--upgrade", "pip"]).await
    }

    /// Install declared dependencies, falling back to the minimal
    /// package set when the manifest is absent.
    pub async fn ensure_dependencies(&self, manifest: &Path) -> Result<DependencyOutcome> {
        if !manifest.is_file() {
            warn!(
                manifest = %manifest.display(),
                "manifest not found, installing fallback package set"
            );
            let fallback: Vec<String> =
                FALLBACK_PACKAGES.iter().map(|p| p.to_string()).collect();
            self.install_list(&fallback).await?;
            return Ok(DependencyOutcome::InstalledFallback);
        }

        if self.is_manifest_current(manifest) {
            debug!(manifest = %manifest.display(), "manifest unchanged, skipping install");
            return Ok(DependencyOutcome::AlreadyCurrent);
        }

        self.install_manifest(manifest).await?;
        self.record_manifest(manifest)?;
        Ok(DependencyOutcome::InstalledFromManifest)
    }

    pub async fn install_manifest(&self, manifest: &Path) -> Result<()> {
        info!(manifest = %manifest.display(), "installing requirements");
        let manifest_arg = manifest.display().to_string();
        self.run_pip(&["install", "-r", &manifest_arg]).await
    }

    pub async fn install_list(&self, packages: &[String]) -> Result<()> {
        info!(?packages, "installing packages");
        let mut args = vec!["install"];
        args.extend(packages.iter().map(|p| p.as_str()));
        self.run_pip(&args).await
    }

    /// Whether the recorded marker matches the manifest's digest.
    pub fn is_manifest_current(&self, manifest: &Path) -> bool {
        let Ok(digest) = manifest_digest(manifest) else {
            return false;
        };
        match std::fs::read_to_string(self.marker_path()) {
            Ok(recorded) => recorded.trim() == digest,
            Err(_) => false,
        }
    }

    fn record_manifest(&self, manifest: &Path) -> Result<()> {
        let digest = manifest_digest(manifest)?;
        std::fs::write(self.marker_path(), digest)?;
        Ok(())
    }

    fn marker_path(&self) -> PathBuf {
        self.env_dir.join(MARKER_FILE)
    }

    async fn run_pip(&self, args: &[&str]) -> Result<()> {
        let child = Command::new(&self.python)
            .args(["-m", "pip"])
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| EnvError::PipFailed(e.to_string()))?;

        let output = tokio::time::timeout(PIP_TIMEOUT, child.wait_with_output())
            .await
            .map_err(|_| EnvError::PipTimeout(PIP_TIMEOUT.as_secs()))??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(EnvError::PipFailed(
                stderr.lines().last().unwrap_or("unknown error").trim().to_string(),
            ));
        }
        Ok(())
    }
}

/// SHA-256 hex digest of the manifest contents.
pub fn manifest_digest(manifest: &Path) -> Result<String> {
    let content = std::fs::read(manifest)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

// Fix actions in the diagnostic configuration install through the same
// pip driver the bootstrap uses.
#[async_trait]
impl PackageInstaller for PipInstaller {
    async fn install_packages(&self, packages: &[String]) -> anyhow::Result<()> {
        self.install_list(packages).await?;
        Ok(())
    }

    async fn install_from_manifest(&self, manifest: &Path) -> anyhow::Result<()> {
        self.install_manifest(manifest).await?;
        self.record_manifest(manifest)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn installer(env_dir: &Path) -> PipInstaller {
        PipInstaller {
            python: env_dir.join("bin").join("python"),
            env_dir: env_dir.to_path_buf(),
        }
    }

    #[test]
    fn test_manifest_digest_deterministic() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "fastapi==0.110\nuvicorn\n").unwrap();

        let digest1 = manifest_digest(&manifest).unwrap();
        let digest2 = manifest_digest(&manifest).unwrap();
        assert_eq!(digest1, digest2);
        assert_eq!(digest1.len(), 64);
    }

    #[test]
    fn test_changing_manifest_changes_digest() {
        let dir = tempdir().unwrap();
        let manifest = dir.path().join("requirements.txt");

        std::fs::write(&manifest, "fastapi\n").unwrap();
        let digest1 = manifest_digest(&manifest).unwrap();

        std::fs::write(&manifest, "fastapi\nnumpy\n").unwrap();
        let digest2 = manifest_digest(&manifest).unwrap();

        assert_ne!(digest1, digest2);
    }

    #[test]
    fn test_marker_roundtrip_marks_manifest_current() {
        let dir = tempdir().unwrap();
        let env_dir = dir.path().join(".venv");
        std::fs::create_dir_all(env_dir.join("bin")).unwrap();
        let manifest = dir.path().join("requirements.txt");
        std::fs::write(&manifest, "fastapi\n").unwrap();

        let pip = installer(&env_dir);
        assert!(!pip.is_manifest_current(&manifest));

        pip.record_manifest(&manifest).unwrap();
        assert!(pip.is_manifest_current(&manifest));

        // Editing the manifest invalidates the marker.
        std::fs::write(&manifest, "fastapi\ntraci\n").unwrap();
        assert!(!pip.is_manifest_current(&manifest));
    }

    #[test]
    fn test_missing_manifest_is_never_current() {
        let dir = tempdir().unwrap();
        let env_dir = dir.path().join(".venv");
        std::fs::create_dir_all(&env_dir).unwrap();

        let pip = installer(&env_dir);
        assert!(!pip.is_manifest_current(&dir.path().join("requirements.txt")));
    }
}
