//! GLIDE Preflight - readiness checks for the corridor demo stack
//!
//! Provides the check engine shared by `glidectl doctor` and the
//! bootstrap preflight phase:
//! - Runs an ordered pipeline of independent environment checks
//! - Classifies every outcome as pass / warn / fail
//! - Aggregates outcomes into a phase-grouped run report
//! - Maps failures to remediation advice and an exit decision

pub mod check;
pub mod error;
pub mod fakes;
pub mod fix;
pub mod pipeline;
pub mod policy;
pub mod probe;
pub mod report;
pub mod suite;

// Re-export key types
pub use check::{Check, CheckOutcome, Criticality, Phase, Remedy, Status};
pub use error::ProbeError;
pub use fix::{FixNote, FixRunner, PackageInstaller};
pub use pipeline::{PipelineConfig, PipelineRunner};
pub use policy::ExitDecision;
pub use probe::{
    AssetInspector, AssetKind, ExecutableLocator, ImportProbe, PortInspector, ProbeOutput,
};
pub use report::{Aggregator, CheckRecord, RunReport, Tally};
pub use suite::{diagnostic_suite, ProjectPaths, SuiteContext};
