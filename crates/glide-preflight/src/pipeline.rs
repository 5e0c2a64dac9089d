//! Sequential check execution.
//!
//! Checks run in the fixed order of the pipeline configuration,
//! independently of each other's outcomes. A failing, erroring, timed
//! out, or panicking probe is recorded and the pipeline moves on; the
//! pipeline itself cannot fail.

use crate::check::{Check, CheckOutcome};
use crate::report::{Aggregator, RunReport};
use std::time::Instant;
use tracing::{debug, warn};

/// Ordered list of checks for one invocation, immutable per run.
pub struct PipelineConfig {
    checks: Vec<Check>,
}

impl PipelineConfig {
    pub fn new(checks: Vec<Check>) -> Self {
        PipelineConfig { checks }
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

/// Runs every check of a pipeline configuration in order.
pub struct PipelineRunner;

impl PipelineRunner {
    /// Execute all checks and assemble the run report.
    ///
    /// Every probe runs under its own timeout budget and inside its own
    /// task, so a hung external call or a panicking probe is converted
    /// into a failing record instead of stalling or aborting the run.
    pub async fn run(config: &PipelineConfig) -> RunReport {
        let mut aggregator = Aggregator::new();

        for check in config.checks() {
            let started = Instant::now();
            let outcome = Self::execute(check).await;
            let duration_ms = started.elapsed().as_millis() as u64;

            debug!(
                check = check.name(),
                status = %outcome.status,
                duration_ms,
                "check finished"
            );
            aggregator.record(check, outcome, duration_ms);
        }

        aggregator.finish()
    }

    async fn execute(check: &Check) -> CheckOutcome {
        let probe = tokio::spawn(check.probe());

        match tokio::time::timeout(check.timeout(), probe).await {
            Ok(Ok(Ok(outcome))) => outcome,
            Ok(Ok(Err(err))) => {
                warn!(check = check.name(), error = %err, "probe reported an error");
                CheckOutcome::from_probe_error(&err)
            }
            Ok(Err(join_err)) => {
                // The probe task panicked; contain it at the check boundary.
                warn!(check = check.name(), "probe panicked");
                CheckOutcome::fail().with_detail(format!("probe panicked: {join_err}"))
            }
            Err(_) => {
                warn!(
                    check = check.name(),
                    timeout_ms = check.timeout().as_millis() as u64,
                    "probe timed out"
                );
                CheckOutcome::fail().with_detail("probe timed out")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Criticality, Phase, Status};
    use crate::error::ProbeError;
    use std::time::Duration;

    fn passing(name: &str) -> Check {
        Check::new(name, Phase::Environment, Criticality::Advisory, || async {
            Ok(CheckOutcome::pass())
        })
    }

    #[tokio::test]
    async fn test_empty_pipeline_yields_empty_report() {
        let report = PipelineRunner::run(&PipelineConfig::new(vec![])).await;
        assert!(report.records.is_empty());
        assert_eq!(report.tally().total, 0);
    }

    #[tokio::test]
    async fn test_checks_recorded_in_execution_order() {
        let config = PipelineConfig::new(vec![passing("first"), passing("second"), passing("third")]);
        let report = PipelineRunner::run(&config).await;

        let names: Vec<&str> = report.records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_probe_error_becomes_fail() {
        let erroring = Check::new("broken", Phase::Assets, Criticality::Advisory, || async {
            Err(ProbeError::Missing("corridor.sumocfg".to_string()))
        });
        let config = PipelineConfig::new(vec![erroring, passing("after")]);

        let report = PipelineRunner::run(&config).await;
        assert_eq!(report.records[0].outcome.status, Status::Fail);
        assert_eq!(
            report.records[0].outcome.detail.as_deref(),
            Some("corridor.sumocfg not found")
        );
        // The pipeline kept going past the failure.
        assert_eq!(report.records[1].outcome.status, Status::Pass);
    }

    #[tokio::test]
    async fn test_panicking_probe_becomes_fail() {
        let panicking = Check::new("panics", Phase::Assets, Criticality::Advisory, || async {
            panic!("boom")
        });
        let config = PipelineConfig::new(vec![panicking, passing("after")]);

        let report = PipelineRunner::run(&config).await;
        assert_eq!(report.records[0].outcome.status, Status::Fail);
        assert!(report.records[0]
            .outcome
            .detail
            .as_deref()
            .unwrap()
            .contains("panicked"));
        assert_eq!(report.records[1].outcome.status, Status::Pass);
    }

    #[tokio::test]
    async fn test_hung_probe_times_out() {
        let hung = Check::new("hangs", Phase::Executables, Criticality::Advisory, || async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(CheckOutcome::pass())
        })
        .with_timeout(Duration::from_millis(50));
        let config = PipelineConfig::new(vec![hung, passing("after")]);

        let report = PipelineRunner::run(&config).await;
        assert_eq!(report.records[0].outcome.status, Status::Fail);
        assert_eq!(report.records[0].outcome.detail.as_deref(), Some("probe timed out"));
        assert_eq!(report.records[1].outcome.status, Status::Pass);
    }

    #[tokio::test]
    async fn test_tally_matches_executed_checks() {
        let warning = Check::new("warns", Phase::Network, Criticality::Advisory, || async {
            Ok(CheckOutcome::warn())
        });
        let failing = Check::new("fails", Phase::Libraries, Criticality::Advisory, || async {
            Ok(CheckOutcome::fail())
        });
        let config = PipelineConfig::new(vec![passing("ok"), warning, failing]);

        let tally = PipelineRunner::run(&config).await.tally();
        assert_eq!(tally.passed, 1);
        assert_eq!(tally.warned, 1);
        assert_eq!(tally.failed, 1);
        assert_eq!(tally.total, 3);
    }
}
