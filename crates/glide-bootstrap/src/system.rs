//! Adapters binding the sequence traits to the real environment manager.

use crate::sequence::{DependencyResolver, EnvLifecycle};
use async_trait::async_trait;
use glide_envman::{DependencyOutcome, PipInstaller, VirtualEnv, FALLBACK_PACKAGES};
use std::path::{Path, PathBuf};

/// The managed `.venv` plus the system interpreter used to create it.
pub struct SystemEnv {
    venv: VirtualEnv,
    system_python: PathBuf,
    manifest: PathBuf,
}

impl SystemEnv {
    pub fn new(
        env_dir: impl Into<PathBuf>,
        system_python: impl Into<PathBuf>,
        manifest: impl Into<PathBuf>,
    ) -> Self {
        SystemEnv {
            venv: VirtualEnv::new(env_dir),
            system_python: system_python.into(),
            manifest: manifest.into(),
        }
    }

    fn installer(&self) -> anyhow::Result<PipInstaller> {
        Ok(PipInstaller::new(&self.venv.activate()?))
    }
}

#[async_trait]
impl EnvLifecycle for SystemEnv {
    fn exists(&self) -> bool {
        self.venv.exists()
    }

    async fn create(&self) -> anyhow::Result<()> {
        self.venv.create(&self.system_python).await?;
        Ok(())
    }

    fn destroy(&self) -> anyhow::Result<()> {
        self.venv.destroy()?;
        Ok(())
    }

    fn activate(&self) -> anyhow::Result<PathBuf> {
        Ok(self.venv.activate()?.python)
    }
}

#[async_trait]
impl DependencyResolver for SystemEnv {
    async fn upgrade_installer(&self) -> anyhow::Result<()> {
        self.installer()?.upgrade_pip().await?;
        Ok(())
    }

    async fn install(&self) -> anyhow::Result<String> {
        let summary = match self.installer()?.ensure_dependencies(&self.manifest).await? {
            DependencyOutcome::AlreadyCurrent => "requirements unchanged".to_string(),
            DependencyOutcome::InstalledFromManifest => {
                format!("installed from {}", self.manifest.display())
            }
            DependencyOutcome::InstalledFallback => format!(
                "manifest missing, installed fallback set: {}",
                FALLBACK_PACKAGES.join(", ")
            ),
        };
        Ok(summary)
    }
}

impl SystemEnv {
    pub fn manifest(&self) -> &Path {
        &self.manifest
    }
}
