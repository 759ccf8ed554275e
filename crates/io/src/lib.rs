// File I/O: tabular loading (CSV, Excel) and report writing

pub mod csv;
pub mod loader;
pub mod table;
pub mod writer;
pub mod xlsx;

pub use loader::FileLoader;
pub use writer::{sink_for, sinks_for, Artifact, CsvReportWriter, XlsxReportWriter};
