//! Exit decision policy.

use crate::report::Tally;
use serde::{Deserialize, Serialize};

/// Terminal classification of a completed run.
///
/// A pure function of the tallies; which specific checks failed does
/// not change the decision.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitDecision {
    /// Every check passed.
    Clean,
    /// At least one check failed.
    Failure,
    /// No failures, but at least one warning.
    AdvisoryOnly,
}

impl ExitDecision {
    pub fn from_tally(tally: &Tally) -> Self {
        if tally.failed > 0 {
            ExitDecision::Failure
        } else if tally.warned > 0 {
            ExitDecision::AdvisoryOnly
        } else {
            ExitDecision::Clean
        }
    }

    /// Process exit code for the diagnostic configuration.
    pub fn code(&self) -> i32 {
        match self {
            ExitDecision::Clean => 0,
            ExitDecision::Failure => 1,
            ExitDecision::AdvisoryOnly => 2,
        }
    }
}
