//! Opt-in fix actions for the diagnostic configuration.
//!
//! Maps specific failure identities to idempotent remediation attempts.
//! Each remedy is attempted at most once per invocation, a failed
//! attempt is demoted to a warn-level note, and the originating check is
//! never retried here; the operator re-runs the pipeline to confirm.

use crate::check::Remedy;
use crate::report::RunReport;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Package installation surface consumed by fix actions.
///
/// Implemented by the environment manager's pip installer; failures are
/// advisory by contract.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    async fn install_packages(&self, packages: &[String]) -> anyhow::Result<()>;
    async fn install_from_manifest(&self, manifest: &Path) -> anyhow::Result<()>;
}

/// Result of one fix attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixNote {
    pub remedy: Remedy,
    pub applied: bool,
    pub note: String,
}

/// Applies fix actions derived from a completed run report.
pub struct FixRunner<'a> {
    installer: &'a dyn PackageInstaller,
    manifest: PathBuf,
}

impl<'a> FixRunner<'a> {
    pub fn new(installer: &'a dyn PackageInstaller, manifest: PathBuf) -> Self {
        FixRunner {
            installer,
            manifest,
        }
    }

    /// Attempt every fixable remedy the report recommends, once each.
    ///
    /// Remedies without a mapped action (installing SUMO, editing
    /// environment variables, freeing ports) are left to the operator
    /// and produce no note.
    pub async fn run(&self, report: &RunReport) -> Vec<FixNote> {
        let mut notes = Vec::new();

        // recommendations() is already deduplicated by remedy identity,
        // which gives the at-most-once guarantee.
        for remedy in report.recommendations() {
            let attempt = match &remedy {
                Remedy::InstallPackage(name) => {
                    info!(package = %name, "attempting package install");
                    Some(
                        self.installer
                            .install_packages(std::slice::from_ref(name))
                            .await
                            .map(|_| format!("installed {name}")),
                    )
                }
                Remedy::InstallRequirements => {
                    info!(manifest = %self.manifest.display(), "attempting requirements install");
                    Some(
                        self.installer
                            .install_from_manifest(&self.manifest)
                            .await
                            .map(|_| format!("installed {}", self.manifest.display())),
                    )
                }
                _ => None,
            };

            if let Some(result) = attempt {
                let note = match result {
                    Ok(done) => FixNote {
                        remedy,
                        applied: true,
                        note: done,
                    },
                    Err(err) => {
                        warn!(error = %err, "fix attempt failed");
                        FixNote {
                            remedy,
                            applied: false,
                            note: format!("fix attempt failed: {err}"),
                        }
                    }
                };
                notes.push(note);
            }
        }

        notes
    }
}
