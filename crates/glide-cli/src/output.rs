//! Report rendering.
//!
//! Presentation lives entirely here: symbols and grouping are a pure
//! function of the outcome enum and the phase tags, never of check
//! internals. Raw outcomes come first, recommendations after, so an
//! operator can act without re-reading every line.

use glide_preflight::{ExitDecision, Phase, RunReport};
use std::fmt::Write;

/// Human-readable, phase-grouped report.
pub fn render_report(report: &RunReport, detailed: bool) -> String {
    let mut out = String::new();

    for phase in Phase::all() {
        let records: Vec<_> = report.records_in_phase(phase).collect();
        if records.is_empty() {
            continue;
        }

        let _ = writeln!(out, "{}:", phase.label());
        for record in records {
            let _ = write!(out, "  [{:>4}] {}", record.outcome.status.symbol(), record.name);
            if let Some(detail) = &record.outcome.detail {
                let _ = write!(out, " - {detail}");
            }
            let _ = writeln!(out);
            if detailed && !record.description.is_empty() {
                let _ = writeln!(
                    out,
                    "         {} ({} ms)",
                    record.description, record.duration_ms
                );
            }
        }
    }

    let tally = report.tally();
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} checks: {} passed, {} warned, {} failed ({} ms)",
        tally.total, tally.passed, tally.warned, tally.failed, report.duration_ms
    );

    let recommendations = report.recommendations();
    if !recommendations.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "recommendations:");
        for remedy in &recommendations {
            let _ = writeln!(out, "  - {}", remedy.advice());
        }
    }

    if !report.notes.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "notes:");
        for note in &report.notes {
            let _ = writeln!(out, "  - {note}");
        }
    }

    out
}

/// Machine-readable report for log aggregation.
pub fn render_json(report: &RunReport, decision: ExitDecision) -> anyhow::Result<String> {
    let value = serde_json::json!({
        "run_id": report.run_id,
        "started_at": report.started_at,
        "duration_ms": report.duration_ms,
        "tally": report.tally(),
        "records": report.records,
        "recommendations": report
            .recommendations()
            .iter()
            .map(|r| serde_json::json!({ "kind": r, "advice": r.advice() }))
            .collect::<Vec<_>>(),
        "notes": report.notes,
        "exit_code": decision.code(),
    });
    Ok(serde_json::to_string_pretty(&value)?)
}

/// One-line outcome marker for the closing status line.
pub fn status_word(decision: ExitDecision) -> &'static str {
    match decision {
        ExitDecision::Clean => "ready",
        ExitDecision::AdvisoryOnly => "ready with warnings",
        ExitDecision::Failure => "not ready",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glide_preflight::report::CheckRecord;
    use glide_preflight::{Aggregator, CheckOutcome, Criticality, Remedy};

    fn sample_report() -> RunReport {
        let mut agg = Aggregator::new();
        agg.push(CheckRecord {
            name: "python3".to_string(),
            description: "Python interpreter for the backend".to_string(),
            phase: Phase::Executables,
            criticality: Criticality::Blocking,
            outcome: CheckOutcome::pass().with_detail("Python 3.11.6"),
            duration_ms: 12,
        });
        agg.push(CheckRecord {
            name: "sumo".to_string(),
            description: String::new(),
            phase: Phase::Executables,
            criticality: Criticality::Advisory,
            outcome: CheckOutcome::warn()
                .with_detail("sumo not found on PATH or under SUMO_HOME")
                .with_remedy(Remedy::InstallSumo),
            duration_ms: 3,
        });
        agg.finish()
    }

    #[test]
    fn test_report_groups_by_phase_and_lists_recommendations() {
        let rendered = render_report(&sample_report(), false);

        assert!(rendered.contains("executables:"));
        assert!(rendered.contains("[  ok] python3 - Python 3.11.6"));
        assert!(rendered.contains("[warn] sumo"));
        assert!(rendered.contains("2 checks: 1 passed, 1 warned, 0 failed"));
        assert!(rendered.contains("recommendations:"));
        assert!(rendered.contains("Install SUMO"));
    }

    #[test]
    fn test_detailed_mode_adds_descriptions() {
        let rendered = render_report(&sample_report(), true);
        assert!(rendered.contains("Python interpreter for the backend"));
        assert!(rendered.contains("(12 ms)"));
    }

    #[test]
    fn test_notes_section_rendered_when_present() {
        let mut report = sample_report();
        report.append_note("fix applied: installed traci");

        let rendered = render_report(&report, false);
        assert!(rendered.contains("notes:"));
        assert!(rendered.contains("installed traci"));
    }

    #[test]
    fn test_json_report_carries_exit_code() {
        let report = sample_report();
        let decision = ExitDecision::from_tally(&report.tally());
        let rendered = render_json(&report, decision).unwrap();

        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["exit_code"], 2);
        assert_eq!(value["tally"]["warned"], 1);
        assert_eq!(value["recommendations"][0]["kind"], "install_sumo");
    }
}
