//! Report sinks for the two canonical artifacts.

use std::path::{Path, PathBuf};

use hcrecon_recon::config::{OutputConfig, ReportFormat};
use hcrecon_recon::evidence::{format_cents, ReconSummary};
use hcrecon_recon::model::CellValue;
use hcrecon_recon::report::{DiscrepancyReport, DiscrepancyTable, Grid};
use hcrecon_recon::sink::ReportSink;
use hcrecon_recon::ReconError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    /// Control records no source explains.
    ControlOwed,
    /// Source records the control ledger does not explain.
    SourceUnexplained,
}

impl Artifact {
    pub fn sheet_name(self) -> &'static str {
        match self {
            Self::ControlOwed => "control_owed",
            Self::SourceUnexplained => "source_unexplained",
        }
    }

    pub fn table(self, report: &DiscrepancyReport) -> &DiscrepancyTable {
        match self {
            Self::ControlOwed => &report.control_owed,
            Self::SourceUnexplained => &report.source_unexplained,
        }
    }
}

fn metric(name: &str, value: CellValue) -> Vec<CellValue> {
    vec![CellValue::Text(name.into()), value]
}

fn count(n: usize) -> CellValue {
    CellValue::Number(n as f64)
}

fn amount(cents: i64) -> CellValue {
    CellValue::Number(cents as f64 / 100.0)
}

/// Summary statistics as a two-column metric/value grid.
pub fn summary_grid(summary: &ReconSummary) -> Grid {
    let mut rows = vec![
        metric("control_records", count(summary.control_records)),
        metric("source_records", count(summary.source_records)),
        metric("matched", count(summary.matched)),
        metric("matched_by_identifier", count(summary.matched_by_identifier)),
        metric("matched_by_name", count(summary.matched_by_name)),
        metric("control_owed", count(summary.control_owed.count)),
        metric("control_owed_amount", amount(summary.control_owed.amount_cents)),
        metric("source_unexplained", count(summary.source_unexplained.count)),
        metric("source_unexplained_amount", amount(summary.source_unexplained.amount_cents)),
        metric("control_noise", count(summary.control_noise)),
        metric("source_noise", count(summary.source_noise)),
        metric("control_filtered", count(summary.control_filtered)),
        metric("warnings", count(summary.warnings)),
    ];
    for (dialect, totals) in &summary.by_dialect {
        rows.push(metric(&format!("{dialect}.records"), count(totals.records)));
        rows.push(metric(&format!("{dialect}.matched"), count(totals.matched)));
        rows.push(metric(&format!("{dialect}.unexplained"), count(totals.unexplained)));
        rows.push(metric(
            &format!("{dialect}.unexplained_amount"),
            amount(totals.unexplained_amount_cents),
        ));
    }
    Grid {
        headers: vec!["metric".into(), "value".into()],
        rows,
    }
}

/// Workbook with the artifact's table sheet and a `summary` sheet.
#[derive(Debug, Clone)]
pub struct XlsxReportWriter {
    artifact: Artifact,
    path: PathBuf,
}

impl XlsxReportWriter {
    pub fn new(artifact: Artifact, path: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            path: path.into(),
        }
    }
}

impl ReportSink for XlsxReportWriter {
    fn write(&self, report: &DiscrepancyReport) -> Result<(), ReconError> {
        let table = self.artifact.table(report).to_grid();
        let summary = summary_grid(&report.summary);
        crate::xlsx::write_report(self.artifact.sheet_name(), &table, &summary, &self.path)
            .map_err(|e| write_error(&self.path, e))?;
        log::info!(
            "wrote {} ({} rows, total {})",
            self.path.display(),
            table.rows.len(),
            format_cents(self.artifact.table(report).total_cents())
        );
        Ok(())
    }
}

/// Plain CSV of the artifact's table.
#[derive(Debug, Clone)]
pub struct CsvReportWriter {
    artifact: Artifact,
    path: PathBuf,
}

impl CsvReportWriter {
    pub fn new(artifact: Artifact, path: impl Into<PathBuf>) -> Self {
        Self {
            artifact,
            path: path.into(),
        }
    }
}

impl ReportSink for CsvReportWriter {
    fn write(&self, report: &DiscrepancyReport) -> Result<(), ReconError> {
        let table = self.artifact.table(report).to_grid();
        crate::csv::write_grid(&table, &self.path).map_err(|e| write_error(&self.path, e))?;
        log::info!("wrote {} ({} rows)", self.path.display(), table.rows.len());
        Ok(())
    }
}

fn write_error(path: &Path, message: String) -> ReconError {
    ReconError::ReportWrite(format!("{}: {message}", path.display()))
}

/// Sink for one artifact, chosen by the path's extension.
pub fn sink_for(artifact: Artifact, path: &Path) -> Result<Box<dyn ReportSink>, ReconError> {
    match ReportFormat::from_path(path) {
        Some(ReportFormat::Xlsx) => Ok(Box::new(XlsxReportWriter::new(artifact, path))),
        Some(ReportFormat::Csv) => Ok(Box::new(CsvReportWriter::new(artifact, path))),
        None => Err(ReconError::ReportWrite(format!(
            "{}: report path must end in .xlsx or .csv",
            path.display()
        ))),
    }
}

/// Every sink configured in `[output]`.
pub fn sinks_for(output: &OutputConfig) -> Result<Vec<Box<dyn ReportSink>>, ReconError> {
    let mut sinks = Vec::new();
    if let Some(path) = &output.control_owed {
        sinks.push(sink_for(Artifact::ControlOwed, path)?);
    }
    if let Some(path) = &output.source_unexplained {
        sinks.push(sink_for(Artifact::SourceUnexplained, path)?);
    }
    Ok(sinks)
}
