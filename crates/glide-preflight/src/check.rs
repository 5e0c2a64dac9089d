//! Check definitions and outcome classification.

use crate::error::ProbeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Default budget for a single check, including any subprocess it spawns.
pub const DEFAULT_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Three-valued check status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Pass,
    Warn,
    Fail,
}

impl Status {
    /// Report symbol for this status. Presentation only; check logic
    /// never branches on symbols.
    pub fn symbol(&self) -> &'static str {
        match self {
            Status::Pass => "ok",
            Status::Warn => "warn",
            Status::Fail => "FAIL",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Whether a failing check may halt a dependent sequence.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Criticality {
    /// Failure halts the bootstrap sequence before launch.
    Blocking,
    /// Failure is reported but never prevents launch.
    Advisory,
}

/// Display phase a check belongs to.
///
/// Phases group the report for top-to-bottom scanning; they carry no
/// pass/fail semantics of their own.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Bootstrap environment setup steps; not part of the diagnostic scan.
    Lifecycle,
    Environment,
    Executables,
    Libraries,
    Assets,
    Permissions,
    Network,
}

impl Phase {
    pub fn label(&self) -> &'static str {
        match self {
            Phase::Lifecycle => "environment lifecycle",
            Phase::Environment => "environment variables",
            Phase::Executables => "executables",
            Phase::Libraries => "libraries",
            Phase::Assets => "assets",
            Phase::Permissions => "permissions",
            Phase::Network => "network",
        }
    }

    /// All phases in report order.
    pub fn all() -> [Phase; 7] {
        [
            Phase::Lifecycle,
            Phase::Environment,
            Phase::Executables,
            Phase::Libraries,
            Phase::Assets,
            Phase::Permissions,
            Phase::Network,
        ]
    }
}

/// Stable remediation identity.
///
/// Recommendations are deduplicated by comparing these tags, not the
/// human-readable text derived from them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Remedy {
    InstallPython,
    EnsurePip,
    InstallSumo,
    SetSumoHome,
    FixSumoHome,
    ActivateEnvironment,
    /// Install a single named package into the managed environment.
    InstallPackage(String),
    InstallRequirements,
    RestoreBackendSources,
    RepairCorridorConfig,
    FixPermissions,
    FreePort(u16),
}

impl Remedy {
    /// Human-readable remediation text.
    pub fn advice(&self) -> String {
        match self {
            Remedy::InstallPython => {
                "Install Python 3.10+ and make sure `python3` is on PATH".to_string()
            }
            Remedy::EnsurePip => {
                "Bootstrap pip with `python3 -m ensurepip --upgrade`".to_string()
            }
            Remedy::InstallSumo => format!(
                "Install SUMO from {} and re-run the checks",
                crate::suite::SUMO_DOWNLOAD_URL
            ),
            Remedy::SetSumoHome => {
                "Set SUMO_HOME to the SUMO installation directory".to_string()
            }
            Remedy::FixSumoHome => {
                "SUMO_HOME points at a missing directory; update it to the SUMO install path"
                    .to_string()
            }
            Remedy::ActivateEnvironment => {
                "Activate the managed environment: `source .venv/bin/activate`".to_string()
            }
            Remedy::InstallPackage(name) => format!(
                "Install the missing package into the environment: `pip install {name}`"
            ),
            Remedy::InstallRequirements => {
                "Install backend requirements: `pip install -r backend/requirements.txt`"
                    .to_string()
            }
            Remedy::RestoreBackendSources => {
                "Restore backend/app_glide.py from the repository checkout".to_string()
            }
            Remedy::RepairCorridorConfig => {
                "backend/assets/corridor.sumocfg is not well-formed XML; regenerate it"
                    .to_string()
            }
            Remedy::FixPermissions => {
                "Fix filesystem permissions on the project directory".to_string()
            }
            Remedy::FreePort(port) => format!(
                "Port {port} is already bound; stop the other process or pass --port"
            ),
        }
    }
}

/// Outcome of a single check execution.
///
/// Produced fresh on every run and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckOutcome {
    pub status: Status,
    /// Free-text context, shown in detailed output.
    pub detail: Option<String>,
    /// Structured remediation hint, fed to the recommendation engine.
    pub remedy: Option<Remedy>,
}

impl CheckOutcome {
    pub fn pass() -> Self {
        CheckOutcome {
            status: Status::Pass,
            detail: None,
            remedy: None,
        }
    }

    pub fn warn() -> Self {
        CheckOutcome {
            status: Status::Warn,
            detail: None,
            remedy: None,
        }
    }

    pub fn fail() -> Self {
        CheckOutcome {
            status: Status::Fail,
            detail: None,
            remedy: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_remedy(mut self, remedy: Remedy) -> Self {
        self.remedy = Some(remedy);
        self
    }

    /// Convert a probe error into a failing outcome at the check boundary.
    pub fn from_probe_error(err: &ProbeError) -> Self {
        CheckOutcome::fail().with_detail(err.to_string())
    }
}

type ProbeFuture = Pin<Box<dyn Future<Output = Result<CheckOutcome, ProbeError>> + Send>>;
type ProbeFn = Box<dyn Fn() -> ProbeFuture + Send + Sync>;

/// A single named verification step.
///
/// Owned by the pipeline definition; immutable once defined. The probe
/// captures everything it needs (paths, collaborator handles) at
/// construction time, so running it takes no arguments and shares no
/// state with other checks.
pub struct Check {
    name: String,
    description: String,
    phase: Phase,
    criticality: Criticality,
    timeout: Duration,
    probe: ProbeFn,
}

impl Check {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        phase: Phase,
        criticality: Criticality,
        probe: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<CheckOutcome, ProbeError>> + Send + 'static,
    {
        Check {
            name: name.into(),
            description: String::new(),
            phase,
            criticality,
            timeout: DEFAULT_CHECK_TIMEOUT,
            probe: Box::new(move || Box::pin(probe())),
        }
    }

    /// What this check verifies, shown in detailed output.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn criticality(&self) -> Criticality {
        self.criticality
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the probe. Callers bound this with [`Check::timeout`].
    pub fn probe(&self) -> ProbeFuture {
        (self.probe)()
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("phase", &self.phase)
            .field("criticality", &self.criticality)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_symbols() {
        assert_eq!(Status::Pass.symbol(), "ok");
        assert_eq!(Status::Warn.symbol(), "warn");
        assert_eq!(Status::Fail.symbol(), "FAIL");
    }

    #[test]
    fn test_outcome_builders() {
        let outcome = CheckOutcome::warn()
            .with_detail("SUMO_HOME is not set")
            .with_remedy(Remedy::SetSumoHome);

        assert_eq!(outcome.status, Status::Warn);
        assert_eq!(outcome.detail.as_deref(), Some("SUMO_HOME is not set"));
        assert_eq!(outcome.remedy, Some(Remedy::SetSumoHome));
    }

    #[test]
    fn test_outcome_from_probe_error() {
        let outcome = CheckOutcome::from_probe_error(&ProbeError::Timeout);
        assert_eq!(outcome.status, Status::Fail);
        assert_eq!(outcome.detail.as_deref(), Some("probe timed out"));
        assert!(outcome.remedy.is_none());
    }

    #[test]
    fn test_remedy_identity_is_tag_based() {
        // Dedup compares tags, so equal tags must compare equal even
        // though advice() allocates fresh strings.
        assert_eq!(
            Remedy::InstallPackage("fastapi".to_string()),
            Remedy::InstallPackage("fastapi".to_string())
        );
        assert_ne!(
            Remedy::InstallPackage("fastapi".to_string()),
            Remedy::InstallPackage("numpy".to_string())
        );
    }

    #[test]
    fn test_remedy_advice_names_the_package() {
        let advice = Remedy::InstallPackage("uvicorn".to_string()).advice();
        assert!(advice.contains("pip install uvicorn"));
    }

    #[tokio::test]
    async fn test_check_probe_runs() {
        let check = Check::new("always-pass", Phase::Environment, Criticality::Advisory, || {
            async { Ok(CheckOutcome::pass()) }
        });

        let outcome = check.probe().await.expect("probe failed");
        assert_eq!(outcome.status, Status::Pass);
    }
}
