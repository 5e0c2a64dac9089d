//! Run reports and result aggregation.
//!
//! The aggregator is the only mutable accumulator in a pipeline run and
//! is owned exclusively by that run. Tallies are always derived from the
//! ordered record sequence, never tracked separately.

use crate::check::{Check, CheckOutcome, Criticality, Phase, Remedy, Status};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use uuid::Uuid;

/// One executed check and its classified outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckRecord {
    pub name: String,
    pub description: String,
    pub phase: Phase,
    pub criticality: Criticality,
    pub outcome: CheckOutcome,
    pub duration_ms: u64,
}

/// Outcome counts for one run.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Tally {
    pub passed: u32,
    pub warned: u32,
    pub failed: u32,
    pub total: u32,
}

/// Complete record of one pipeline execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Run ID, fresh per execution.
    pub run_id: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// Ordered `(check, outcome)` records in execution order.
    pub records: Vec<CheckRecord>,

    /// Warn-level notes appended after the run (fix-action results).
    pub notes: Vec<String>,

    /// Total wall-clock duration in milliseconds.
    pub duration_ms: u64,
}

impl RunReport {
    /// Fold the ordered outcome sequence into counts by kind.
    pub fn tally(&self) -> Tally {
        let mut tally = Tally::default();
        for record in &self.records {
            tally.total += 1;
            match record.outcome.status {
                Status::Pass => tally.passed += 1,
                Status::Warn => tally.warned += 1,
                Status::Fail => tally.failed += 1,
            }
        }
        tally
    }

    /// Remediation hints from failed and warned checks, in execution
    /// order, deduplicated by remedy identity.
    pub fn recommendations(&self) -> Vec<Remedy> {
        let mut seen = Vec::new();
        for record in &self.records {
            if record.outcome.status == Status::Pass {
                continue;
            }
            if let Some(remedy) = &record.outcome.remedy {
                if !seen.contains(remedy) {
                    seen.push(remedy.clone());
                }
            }
        }
        seen
    }

    /// Distinct issue descriptions from every failing check.
    pub fn issues(&self) -> Vec<String> {
        let mut issues: Vec<String> = Vec::new();
        for record in &self.records {
            if record.outcome.status != Status::Fail {
                continue;
            }
            let issue = record
                .outcome
                .detail
                .clone()
                .unwrap_or_else(|| record.name.clone());
            if !issues.contains(&issue) {
                issues.push(issue);
            }
        }
        issues
    }

    /// Whether any blocking check failed.
    pub fn has_blocking_failure(&self) -> bool {
        self.records.iter().any(|r| {
            r.criticality == Criticality::Blocking && r.outcome.status == Status::Fail
        })
    }

    /// Records for one display phase, preserving execution order.
    pub fn records_in_phase(&self, phase: Phase) -> impl Iterator<Item = &CheckRecord> {
        self.records.iter().filter(move |r| r.phase == phase)
    }

    pub fn append_note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }
}

/// Accumulates check records for one run.
pub struct Aggregator {
    run_id: String,
    started_at: DateTime<Utc>,
    started: Instant,
    records: Vec<CheckRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Aggregator {
            run_id: Uuid::new_v4().to_string(),
            started_at: Utc::now(),
            started: Instant::now(),
            records: Vec::new(),
        }
    }

    /// Append one executed check in execution order.
    pub fn record(&mut self, check: &Check, outcome: CheckOutcome, duration_ms: u64) {
        self.push(CheckRecord {
            name: check.name().to_string(),
            description: check.description().to_string(),
            phase: check.phase(),
            criticality: check.criticality(),
            outcome,
            duration_ms,
        });
    }

    /// Append an already-built record. Used by the bootstrap sequencer
    /// to fold lifecycle steps and preflight results into one report.
    pub fn push(&mut self, record: CheckRecord) {
        self.records.push(record);
    }

    /// Consume the aggregator and produce the immutable report.
    pub fn finish(self) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            records: self.records,
            notes: Vec::new(),
            duration_ms: self.started.elapsed().as_millis() as u64,
        }
    }
}

impl Default for Aggregator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::{Check, Criticality, Phase};

    fn check(name: &str, phase: Phase, criticality: Criticality) -> Check {
        Check::new(name, phase, criticality, || async {
            Ok(CheckOutcome::pass())
        })
    }

    fn report_with(outcomes: Vec<(&str, Criticality, CheckOutcome)>) -> RunReport {
        let mut agg = Aggregator::new();
        for (name, criticality, outcome) in outcomes {
            let c = check(name, Phase::Libraries, criticality);
            agg.record(&c, outcome, 1);
        }
        agg.finish()
    }

    #[test]
    fn test_tally_conservation() {
        let report = report_with(vec![
            ("a", Criticality::Advisory, CheckOutcome::pass()),
            ("b", Criticality::Advisory, CheckOutcome::warn()),
            ("c", Criticality::Blocking, CheckOutcome::fail()),
            ("d", Criticality::Advisory, CheckOutcome::fail()),
        ]);

        let tally = report.tally();
        assert_eq!(tally.passed, 1);
        assert_eq!(tally.warned, 1);
        assert_eq!(tally.failed, 2);
        assert_eq!(tally.total, 4);
        assert_eq!(
            tally.passed + tally.warned + tally.failed,
            tally.total,
            "every outcome is counted exactly once"
        );
    }

    #[test]
    fn test_recommendations_dedup_by_remedy_identity() {
        let report = report_with(vec![
            (
                "fastapi",
                Criticality::Advisory,
                CheckOutcome::fail().with_remedy(Remedy::InstallRequirements),
            ),
            (
                "uvicorn",
                Criticality::Advisory,
                CheckOutcome::fail().with_remedy(Remedy::InstallRequirements),
            ),
            (
                "traci",
                Criticality::Advisory,
                CheckOutcome::warn().with_remedy(Remedy::InstallSumo),
            ),
        ]);

        let recs = report.recommendations();
        assert_eq!(recs, vec![Remedy::InstallRequirements, Remedy::InstallSumo]);
    }

    #[test]
    fn test_recommendations_preserve_execution_order() {
        let report = report_with(vec![
            (
                "sumo",
                Criticality::Advisory,
                CheckOutcome::warn().with_remedy(Remedy::InstallSumo),
            ),
            (
                "python3",
                Criticality::Blocking,
                CheckOutcome::fail().with_remedy(Remedy::InstallPython),
            ),
        ]);

        assert_eq!(
            report.recommendations(),
            vec![Remedy::InstallSumo, Remedy::InstallPython]
        );
    }

    #[test]
    fn test_passing_checks_contribute_no_recommendations() {
        let report = report_with(vec![(
            "a",
            Criticality::Advisory,
            // A remedy on a passing outcome would be a suite bug; the
            // engine must still ignore it.
            CheckOutcome::pass().with_remedy(Remedy::InstallSumo),
        )]);

        assert!(report.recommendations().is_empty());
    }

    #[test]
    fn test_issues_fall_back_to_check_name() {
        let report = report_with(vec![
            ("no-detail", Criticality::Advisory, CheckOutcome::fail()),
            (
                "with-detail",
                Criticality::Advisory,
                CheckOutcome::fail().with_detail("corridor.sumocfg: truncated"),
            ),
        ]);

        assert_eq!(
            report.issues(),
            vec!["no-detail".to_string(), "corridor.sumocfg: truncated".to_string()]
        );
    }

    #[test]
    fn test_report_serializes_for_log_emission() {
        let report = report_with(vec![(
            "sumo",
            Criticality::Advisory,
            CheckOutcome::warn().with_remedy(Remedy::InstallSumo),
        )]);

        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["records"][0]["name"], "sumo");
        assert_eq!(value["records"][0]["outcome"]["status"], "warn");
        assert_eq!(value["records"][0]["outcome"]["remedy"], "install_sumo");
    }

    #[test]
    fn test_blocking_failure_detection() {
        let advisory_only = report_with(vec![(
            "deps",
            Criticality::Advisory,
            CheckOutcome::fail(),
        )]);
        assert!(!advisory_only.has_blocking_failure());

        let blocking = report_with(vec![(
            "python3",
            Criticality::Blocking,
            CheckOutcome::fail(),
        )]);
        assert!(blocking.has_blocking_failure());
    }
}
