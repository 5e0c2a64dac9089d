//! Backend server launch and interrupt handling.

use crate::sequence::BackendLauncher;
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{info, warn};

/// How to start the backend server.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Directory containing `app_glide.py`; uvicorn runs from here.
    pub backend_dir: PathBuf,
    pub host: String,
    pub port: u16,
    /// Watch sources and restart on change.
    pub reload: bool,
}

impl LaunchSpec {
    pub fn new(backend_dir: impl Into<PathBuf>, port: u16) -> Self {
        LaunchSpec {
            backend_dir: backend_dir.into(),
            host: "127.0.0.1".to_string(),
            port,
            reload: true,
        }
    }

    /// Arguments passed to the interpreter.
    fn interpreter_args(&self) -> Vec<String> {
        let mut args = vec![
            "-m".to_string(),
            "uvicorn".to_string(),
            "app_glide:app".to_string(),
            "--host".to_string(),
            self.host.clone(),
            "--port".to_string(),
            self.port.to_string(),
        ];
        if self.reload {
            args.push("--reload".to_string());
        }
        args
    }
}

/// Runs the backend under uvicorn until it exits or the operator
/// interrupts. An interrupt stops the child cleanly and reports exit
/// code 0; the server owns every other exit code.
pub struct UvicornLauncher {
    spec: LaunchSpec,
}

impl UvicornLauncher {
    pub fn new(spec: LaunchSpec) -> Self {
        UvicornLauncher { spec }
    }
}

#[async_trait]
impl BackendLauncher for UvicornLauncher {
    async fn serve(&self, interpreter: &Path) -> anyhow::Result<i32> {
        let mut child = Command::new(interpreter)
            .args(self.spec.interpreter_args())
            .current_dir(&self.spec.backend_dir)
            .kill_on_drop(true)
            .spawn()
            .with_context(|| {
                format!(
                    "failed to start backend with {} in {}",
                    interpreter.display(),
                    self.spec.backend_dir.display()
                )
            })?;

        info!(
            host = %self.spec.host,
            port = self.spec.port,
            "backend running; press ctrl-c to stop"
        );

        tokio::select! {
            status = child.wait() => {
                let code = status?.code().unwrap_or(-1);
                warn!(code, "backend exited on its own");
                Ok(code)
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupt received, stopping backend");
                child.kill().await.ok();
                let _ = child.wait().await;
                Ok(0)
            }
        }
    }
}
