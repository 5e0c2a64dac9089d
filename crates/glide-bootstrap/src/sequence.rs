//! The bootstrap state machine.
//!
//! `Idle → EnvironmentEnsured → Activated → DependenciesResolved →
//! PreflightChecked → Launched → {Terminated(code) | Running}`.
//!
//! Any blocking step failure transitions directly to `Terminated`
//! without running the remaining steps. Every step outcome is folded
//! into the same run report the diagnostic configuration uses, so the
//! operator reads one consolidated, phase-grouped report.

use async_trait::async_trait;
use glide_preflight::report::CheckRecord;
use glide_preflight::{
    Aggregator, CheckOutcome, Criticality, Phase, PipelineConfig, PipelineRunner, Remedy,
    RunReport,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Lifecycle of the managed environment, as the sequencer sees it.
#[async_trait]
pub trait EnvLifecycle: Send + Sync {
    fn exists(&self) -> bool;
    async fn create(&self) -> anyhow::Result<()>;
    fn destroy(&self) -> anyhow::Result<()>;
    /// Resolve the environment's interpreter for downstream steps.
    fn activate(&self) -> anyhow::Result<PathBuf>;
}

/// Dependency resolution against the activated environment.
#[async_trait]
pub trait DependencyResolver: Send + Sync {
    async fn upgrade_installer(&self) -> anyhow::Result<()>;
    /// Install declared dependencies; returns a short summary of what
    /// was done.
    async fn install(&self) -> anyhow::Result<String>;
}

/// Starts the backend and runs until it exits or is interrupted.
#[async_trait]
pub trait BackendLauncher: Send + Sync {
    async fn serve(&self, interpreter: &Path) -> anyhow::Result<i32>;
}

/// Builds the preflight pipeline once the interpreter is known.
pub type PreflightBuilder = Box<dyn Fn(&Path) -> PipelineConfig + Send + Sync>;

/// Bootstrap sequence states.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    Idle,
    EnvironmentEnsured,
    Activated,
    DependenciesResolved,
    PreflightChecked,
    Launched,
    /// The backend owns its lifecycle; held while the launcher blocks
    /// in `serve`.
    Running,
    Terminated(i32),
}

/// Caller-facing knobs, one per CLI flag.
#[derive(Debug, Clone)]
pub struct BootstrapOptions {
    /// Destroy and recreate the environment first.
    pub clean: bool,
    /// Skip dependency installation.
    pub skip_deps: bool,
    pub port: u16,
}

/// Final state plus the consolidated report of everything that ran.
pub struct BootstrapRun {
    pub state: BootstrapState,
    pub report: RunReport,
}

impl BootstrapRun {
    /// Exit code for the bootstrap configuration: non-zero only when a
    /// blocking step or preflight check failed before handoff.
    pub fn exit_code(&self) -> i32 {
        match self.state {
            BootstrapState::Terminated(code) => code,
            _ => 0,
        }
    }
}

pub struct BootstrapSequence {
    env: Arc<dyn EnvLifecycle>,
    deps: Arc<dyn DependencyResolver>,
    launcher: Arc<dyn BackendLauncher>,
    preflight: PreflightBuilder,
}

impl BootstrapSequence {
    pub fn new(
        env: Arc<dyn EnvLifecycle>,
        deps: Arc<dyn DependencyResolver>,
        launcher: Arc<dyn BackendLauncher>,
        preflight: PreflightBuilder,
    ) -> Self {
        BootstrapSequence {
            env,
            deps,
            launcher,
            preflight,
        }
    }

    /// Run the full sequence.
    ///
    /// Never returns an error: every failure is classified into the
    /// report and the terminal state.
    pub async fn run(&self, opts: &BootstrapOptions) -> BootstrapRun {
        let mut agg = Aggregator::new();
        let mut state = BootstrapState::Idle;
        info!(?state, ?opts, "starting bootstrap sequence");

        // Explicit clean request: destroy before ensuring. Destroying an
        // absent or half-created environment succeeds, so a repeated
        // clean run behaves identically.
        if opts.clean {
            let started = Instant::now();
            match self.env.destroy() {
                Ok(()) => record_step(
                    &mut agg,
                    "clean environment",
                    Criticality::Blocking,
                    CheckOutcome::pass().with_detail("environment removed"),
                    started,
                ),
                Err(err) => {
                    error!(error = %err, "clean request failed");
                    record_step(
                        &mut agg,
                        "clean environment",
                        Criticality::Blocking,
                        CheckOutcome::fail().with_detail(err.to_string()),
                        started,
                    );
                    return terminated(agg, 1);
                }
            }
        }

        // Ensure the environment exists.
        let started = Instant::now();
        if self.env.exists() {
            record_step(
                &mut agg,
                "environment",
                Criticality::Blocking,
                CheckOutcome::pass().with_detail("environment present"),
                started,
            );
        } else {
            match self.env.create().await {
                Ok(()) => record_step(
                    &mut agg,
                    "environment",
                    Criticality::Blocking,
                    CheckOutcome::pass().with_detail("environment created"),
                    started,
                ),
                Err(err) => {
                    error!(error = %err, "environment creation failed");
                    record_step(
                        &mut agg,
                        "environment",
                        Criticality::Blocking,
                        CheckOutcome::fail().with_detail(err.to_string()),
                        started,
                    );
                    return terminated(agg, 1);
                }
            }
        }
        state = BootstrapState::EnvironmentEnsured;
        info!(?state, "transition");

        // Activate: resolve the interpreter everything downstream uses.
        let started = Instant::now();
        let interpreter = match self.env.activate() {
            Ok(path) => {
                record_step(
                    &mut agg,
                    "activation",
                    Criticality::Blocking,
                    CheckOutcome::pass().with_detail(path.display().to_string()),
                    started,
                );
                path
            }
            Err(err) => {
                error!(error = %err, "activation failed");
                record_step(
                    &mut agg,
                    "activation",
                    Criticality::Blocking,
                    CheckOutcome::fail().with_detail(err.to_string()),
                    started,
                );
                return terminated(agg, 1);
            }
        };
        state = BootstrapState::Activated;
        info!(?state, "transition");

        // Dependency resolution is advisory: a partially populated
        // environment may still run, and preflight will surface what is
        // actually missing.
        if opts.skip_deps {
            info!("skipping dependency installation by request");
        } else {
            let started = Instant::now();
            if let Err(err) = self.deps.upgrade_installer().await {
                warn!(error = %err, "pip upgrade failed");
                record_step(
                    &mut agg,
                    "upgrade pip",
                    Criticality::Advisory,
                    CheckOutcome::warn().with_detail(err.to_string()),
                    started,
                );
            }

            let started = Instant::now();
            match self.deps.install().await {
                Ok(summary) => record_step(
                    &mut agg,
                    "dependencies",
                    Criticality::Advisory,
                    CheckOutcome::pass().with_detail(summary),
                    started,
                ),
                Err(err) => {
                    warn!(error = %err, "dependency installation failed, continuing");
                    record_step(
                        &mut agg,
                        "dependencies",
                        Criticality::Advisory,
                        CheckOutcome::fail()
                            .with_detail(err.to_string())
                            .with_remedy(Remedy::InstallRequirements),
                        started,
                    );
                }
            }
        }
        state = BootstrapState::DependenciesResolved;
        info!(?state, "transition");

        // Read-only preflight scan with the activated interpreter.
        let config = (self.preflight)(&interpreter);
        let preflight_report = PipelineRunner::run(&config).await;
        let blocked = preflight_report.has_blocking_failure();
        for record in preflight_report.records {
            agg.push(record);
        }
        state = BootstrapState::PreflightChecked;
        info!(?state, "transition");

        if blocked {
            error!("preflight found blocking failures, not launching");
            return terminated(agg, 1);
        }

        state = BootstrapState::Launched;
        info!(?state, port = opts.port, "handing off to backend server");

        let code = match self.launcher.serve(&interpreter).await {
            Ok(code) => code,
            Err(err) => {
                error!(error = %err, "backend launch failed");
                let started = Instant::now();
                record_step(
                    &mut agg,
                    "launch",
                    Criticality::Blocking,
                    CheckOutcome::fail().with_detail(err.to_string()),
                    started,
                );
                1
            }
        };

        BootstrapRun {
            state: BootstrapState::Terminated(code),
            report: agg.finish(),
        }
    }
}

fn record_step(
    agg: &mut Aggregator,
    name: &str,
    criticality: Criticality,
    outcome: CheckOutcome,
    started: Instant,
) {
    agg.push(CheckRecord {
        name: name.to_string(),
        description: String::new(),
        phase: Phase::Lifecycle,
        criticality,
        outcome,
        duration_ms: started.elapsed().as_millis() as u64,
    });
}

fn terminated(agg: Aggregator, code: i32) -> BootstrapRun {
    BootstrapRun {
        state: BootstrapState::Terminated(code),
        report: agg.finish(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_preflight::{Check, Status};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeEnv {
        present: AtomicBool,
        fail_create: bool,
        calls: Mutex<Vec<&'static str>>,
    }

    impl FakeEnv {
        fn present() -> Self {
            let env = FakeEnv::default();
            env.present.store(true, Ordering::SeqCst);
            env
        }
    }

    #[async_trait]
    impl EnvLifecycle for FakeEnv {
        fn exists(&self) -> bool {
            self.present.load(Ordering::SeqCst)
        }

        async fn create(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("create");
            if self.fail_create {
                anyhow::bail!("venv failed");
            }
            self.present.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn destroy(&self) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push("destroy");
            self.present.store(false, Ordering::SeqCst);
            Ok(())
        }

        fn activate(&self) -> anyhow::Result<PathBuf> {
            if !self.exists() {
                anyhow::bail!("no interpreter");
            }
            Ok(PathBuf::from("/demo/.venv/bin/python"))
        }
    }

    #[derive(Default)]
    struct FakeDeps {
        fail_install: bool,
    }

    #[async_trait]
    impl DependencyResolver for FakeDeps {
        async fn upgrade_installer(&self) -> anyhow::Result<()> {
            Ok(())
        }

        async fn install(&self) -> anyhow::Result<String> {
            if self.fail_install {
                anyhow::bail!("resolver error: no matching distribution");
            }
            Ok("installed from manifest".to_string())
        }
    }

    #[derive(Default)]
    struct FakeLauncher {
        launched: AtomicBool,
    }

    #[async_trait]
    impl BackendLauncher for FakeLauncher {
        async fn serve(&self, _interpreter: &Path) -> anyhow::Result<i32> {
            self.launched.store(true, Ordering::SeqCst);
            Ok(0)
        }
    }

    fn empty_preflight() -> PreflightBuilder {
        Box::new(|_| PipelineConfig::new(vec![]))
    }

    fn preflight_with(status: Status, criticality: Criticality) -> PreflightBuilder {
        Box::new(move |_| {
            PipelineConfig::new(vec![Check::new(
                "scripted",
                Phase::Executables,
                criticality,
                move || async move {
                    Ok(match status {
                        Status::Pass => CheckOutcome::pass(),
                        Status::Warn => CheckOutcome::warn(),
                        Status::Fail => CheckOutcome::fail(),
                    })
                },
            )])
        })
    }

    fn options() -> BootstrapOptions {
        BootstrapOptions {
            clean: false,
            skip_deps: false,
            port: 8001,
        }
    }

    #[tokio::test]
    async fn test_happy_path_reaches_terminated_zero() {
        let launcher = Arc::new(FakeLauncher::default());
        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(FakeDeps::default()),
            launcher.clone(),
            empty_preflight(),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
        assert_eq!(run.exit_code(), 0);
        assert!(launcher.launched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_create_failure_blocks_launch() {
        let launcher = Arc::new(FakeLauncher::default());
        let env = FakeEnv {
            fail_create: true,
            ..FakeEnv::default()
        };
        let seq = BootstrapSequence::new(
            Arc::new(env),
            Arc::new(FakeDeps::default()),
            launcher.clone(),
            empty_preflight(),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.state, BootstrapState::Terminated(1));
        assert!(!launcher.launched.load(Ordering::SeqCst), "never launched");
        assert!(run.report.has_blocking_failure());
        // Remaining steps were not run: only clean/ensure records exist.
        assert!(run.report.records.iter().all(|r| r.phase == Phase::Lifecycle));
    }

    #[tokio::test]
    async fn test_advisory_install_failure_still_launches() {
        let launcher = Arc::new(FakeLauncher::default());
        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(FakeDeps { fail_install: true }),
            launcher.clone(),
            empty_preflight(),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
        assert!(launcher.launched.load(Ordering::SeqCst));

        let deps = run
            .report
            .records
            .iter()
            .find(|r| r.name == "dependencies")
            .unwrap();
        assert_eq!(deps.outcome.status, Status::Fail);
        assert_eq!(deps.criticality, Criticality::Advisory);
        assert!(!run.report.has_blocking_failure());
    }

    #[tokio::test]
    async fn test_blocking_preflight_failure_prevents_launch() {
        let launcher = Arc::new(FakeLauncher::default());
        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(FakeDeps::default()),
            launcher.clone(),
            preflight_with(Status::Fail, Criticality::Blocking),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.state, BootstrapState::Terminated(1));
        assert!(!launcher.launched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_advisory_preflight_failure_does_not_prevent_launch() {
        let launcher = Arc::new(FakeLauncher::default());
        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(FakeDeps::default()),
            launcher.clone(),
            preflight_with(Status::Fail, Criticality::Advisory),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
        assert!(launcher.launched.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_preflight_warning_still_reaches_launch() {
        // Port-in-use and similar findings surface as warnings; the
        // sequence proceeds to handoff regardless.
        let launcher = Arc::new(FakeLauncher::default());
        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(FakeDeps::default()),
            launcher.clone(),
            preflight_with(Status::Warn, Criticality::Advisory),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
        assert!(launcher.launched.load(Ordering::SeqCst));
        assert_eq!(run.report.tally().warned, 1);
    }

    #[tokio::test]
    async fn test_clean_destroys_then_recreates() {
        let env = Arc::new(FakeEnv::present());
        let seq = BootstrapSequence::new(
            env.clone(),
            Arc::new(FakeDeps::default()),
            Arc::new(FakeLauncher::default()),
            empty_preflight(),
        );

        let mut opts = options();
        opts.clean = true;

        let run = seq.run(&opts).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
        assert_eq!(*env.calls.lock().unwrap(), vec!["destroy", "create"]);

        // A second clean run on the freshly created environment behaves
        // identically.
        env.calls.lock().unwrap().clear();
        let run = seq.run(&opts).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
        assert_eq!(*env.calls.lock().unwrap(), vec!["destroy", "create"]);
    }

    #[tokio::test]
    async fn test_skip_deps_never_calls_resolver() {
        struct PanickingDeps;

        #[async_trait]
        impl DependencyResolver for PanickingDeps {
            async fn upgrade_installer(&self) -> anyhow::Result<()> {
                panic!("must not be called");
            }
            async fn install(&self) -> anyhow::Result<String> {
                panic!("must not be called");
            }
        }

        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(PanickingDeps),
            Arc::new(FakeLauncher::default()),
            empty_preflight(),
        );

        let mut opts = options();
        opts.skip_deps = true;
        let run = seq.run(&opts).await;
        assert_eq!(run.state, BootstrapState::Terminated(0));
    }

    #[tokio::test]
    async fn test_interrupted_server_maps_to_clean_exit() {
        // serve() returning 0 models the interrupt path: the launcher
        // shuts the child down and reports a clean exit.
        let seq = BootstrapSequence::new(
            Arc::new(FakeEnv::present()),
            Arc::new(FakeDeps::default()),
            Arc::new(FakeLauncher::default()),
            empty_preflight(),
        );

        let run = seq.run(&options()).await;
        assert_eq!(run.exit_code(), 0);
    }
}
