use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::config::ReconConfig;
use crate::error::ReconError;
use crate::matcher::{match_pools, MatchResult};
use crate::model::{FileIssue, IssueKind, NormalizationWarning, Side, TabularRecordSet};
use crate::pool::{build_file_pool, FilePool, RecordPool};
use crate::report::{build_report, DiscrepancyReport};
use crate::schema::resolve;
use crate::sink::{ProgressSink, TabularLoader};

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub config_name: String,
    pub engine_version: String,
    pub run_at: String,
}

/// Everything a run produced. Valid regardless of what happens to the report afterwards.
#[derive(Debug, Clone, Serialize)]
pub struct ReconOutcome {
    pub meta: RunMeta,
    pub result: MatchResult,
    pub report: DiscrepancyReport,
    /// Files skipped during the run.
    pub issues: Vec<FileIssue>,
    pub warnings: Vec<NormalizationWarning>,
}

impl ReconOutcome {
    pub fn has_discrepancies(&self) -> bool {
        !self.report.control_owed.is_empty() || !self.report.source_unexplained.is_empty()
    }
}

type FileOutcome = Result<FilePool, FileIssue>;

/// Run reconciliation per config: load every file, match, build the report.
///
/// Files are loaded and promoted to pools in parallel; matching runs after
/// all loads complete, on a single thread.
pub fn run(
    config: &ReconConfig,
    loader: &dyn TabularLoader,
    progress: &dyn ProgressSink,
) -> Result<ReconOutcome, ReconError> {
    let jobs: Vec<(Side, &PathBuf)> = config
        .control
        .files
        .iter()
        .map(|p| (Side::Control, p))
        .chain(config.source.files.iter().map(|p| (Side::Source, p)))
        .collect();
    reject_repeats(jobs.iter().map(|(side, path)| (*side, path.display().to_string())))?;
    let total = jobs.len();
    let done = AtomicUsize::new(0);

    let outcomes: Vec<(Side, FileOutcome)> = jobs
        .par_iter()
        .map(|&(side, path)| {
            let outcome = loader
                .load(path)
                .map_err(|e| file_issue(side, &path.display().to_string(), e))
                .and_then(|set| prepare_set(config, side, set));
            let n = done.fetch_add(1, Ordering::SeqCst) + 1;
            progress.milestone(&format!("processed file {n} of {total}"));
            (side, outcome)
        })
        .collect();

    assemble(config, outcomes)
}

/// Same as [`run`] for record sets that are already in memory.
pub fn run_sets(
    config: &ReconConfig,
    control: Vec<TabularRecordSet>,
    source: Vec<TabularRecordSet>,
) -> Result<ReconOutcome, ReconError> {
    let jobs: Vec<(Side, TabularRecordSet)> = control
        .into_iter()
        .map(|s| (Side::Control, s))
        .chain(source.into_iter().map(|s| (Side::Source, s)))
        .collect();
    reject_repeats(jobs.iter().map(|(side, set)| (*side, set.label.clone())))?;
    let outcomes = jobs
        .into_par_iter()
        .map(|(side, set)| (side, prepare_set(config, side, set)))
        .collect();
    assemble(config, outcomes)
}

/// A file listed twice on one side would yield the same record ids twice.
fn reject_repeats(labels: impl IntoIterator<Item = (Side, String)>) -> Result<(), ReconError> {
    let mut seen = HashSet::new();
    for (side, label) in labels {
        if !seen.insert((side, label.clone())) {
            return Err(ReconError::ConfigValidation(format!(
                "{side} file '{label}' is listed more than once"
            )));
        }
    }
    Ok(())
}

/// Classify, resolve and promote one file.
fn prepare_set(config: &ReconConfig, side: Side, set: TabularRecordSet) -> FileOutcome {
    let dialect = match side {
        Side::Control => None,
        Side::Source => config.classify(&set.file_name),
    };
    let table = config.alias_table_for(dialect);
    let set = set.with_dialect(dialect.map(|d| d.name.clone()));
    let schema = resolve(&set.columns, &table);
    log::debug!(
        "{} ({}): roles {:?}, extras {:?}",
        set.file_name,
        set.dialect.as_deref().unwrap_or("default"),
        schema.roles,
        schema.extras
    );
    build_file_pool(&set, &schema, side, &config.control.present_statuses)
        .map_err(|e| file_issue(side, &set.file_name, e))
}

fn file_issue(side: Side, file: &str, err: ReconError) -> FileIssue {
    let (kind, message) = match err {
        ReconError::Schema { message, .. } => (IssueKind::Schema, message),
        ReconError::Load { message, .. } => (IssueKind::Load, message),
        other => (IssueKind::Load, other.to_string()),
    };
    FileIssue {
        side,
        file: file.to_string(),
        kind,
        message,
    }
}

/// Ordered fan-in of per-file results, then match and report.
fn assemble(config: &ReconConfig, outcomes: Vec<(Side, FileOutcome)>) -> Result<ReconOutcome, ReconError> {
    let mut issues = Vec::new();
    let mut control_files = Vec::new();
    let mut source_files = Vec::new();
    for (side, outcome) in outcomes {
        match outcome {
            Ok(file) if side == Side::Control => control_files.push(file),
            Ok(file) => source_files.push(file),
            Err(issue) => {
                log::warn!("{issue}");
                issues.push(issue);
            }
        }
    }

    let control = side_pool(Side::Control, control_files, &issues)?;
    let source = side_pool(Side::Source, source_files, &issues)?;

    let result = match_pools(&control, &source);
    let report = build_report(&result, &control, &source);

    let warnings: Vec<NormalizationWarning> = control
        .warnings
        .iter()
        .chain(source.warnings.iter())
        .cloned()
        .collect();
    if !warnings.is_empty() {
        log::warn!(
            "{} cell(s) could not be normalized; rows kept with the field absent",
            warnings.len()
        );
    }

    Ok(ReconOutcome {
        meta: RunMeta {
            config_name: config.name.clone(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: chrono::Utc::now().to_rfc3339(),
        },
        result,
        report,
        issues,
        warnings,
    })
}

fn side_pool(side: Side, files: Vec<FilePool>, issues: &[FileIssue]) -> Result<RecordPool, ReconError> {
    if files.is_empty() {
        let reasons = issues
            .iter()
            .filter(|i| i.side == side)
            .map(|i| format!("{}: {}", i.file, i.message))
            .collect();
        return Err(ReconError::NoUsableFiles { side, reasons });
    }
    let count = files.len();
    let pool = RecordPool::from_files(side, files);
    log::info!("{side}: {} record(s) from {count} file(s)", pool.len());
    if pool.filtered > 0 {
        log::info!("{side}: {} row(s) dropped by the presence filter", pool.filtered);
    }
    Ok(pool)
}
