//! `hcrecon-recon`: visit reconciliation engine.
//!
//! Pure engine crate: receives loaded tabular data through the
//! [`sink::TabularLoader`] seam, returns matched / unexplained records and a
//! discrepancy report. No file-format dependencies.

pub mod config;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod matcher;
pub mod model;
pub mod normalize;
pub mod pool;
pub mod report;
pub mod schema;
pub mod sink;

pub use config::ReconConfig;
pub use engine::{run, run_sets, ReconOutcome};
pub use error::ReconError;
pub use model::{CellValue, Side, TabularRecordSet};
pub use report::DiscrepancyReport;
