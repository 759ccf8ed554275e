//! Collaborator seams: the engine consumes these, the `io` and CLI crates
//! implement them.

use std::path::Path;

use crate::error::ReconError;
use crate::model::TabularRecordSet;
use crate::report::DiscrepancyReport;

/// Turns a file into rows with stable column labels.
pub trait TabularLoader: Sync {
    fn load(&self, path: &Path) -> Result<TabularRecordSet, ReconError>;
}

/// Receives human-readable milestones. Not required for correctness.
pub trait ProgressSink: Sync {
    fn milestone(&self, message: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(&str) + Sync,
{
    fn milestone(&self, message: &str) {
        self(message)
    }
}

pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn milestone(&self, _message: &str) {}
}

/// Persists a computed report. A failure here never invalidates the report.
pub trait ReportSink {
    fn write(&self, report: &DiscrepancyReport) -> Result<(), ReconError>;
}
