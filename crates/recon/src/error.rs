use std::fmt;

use crate::model::Side;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (no files, duplicate dialect, bad output path, etc.).
    ConfigValidation(String),
    /// A file could not be turned into rows.
    Load { file: String, message: String },
    /// A file loaded but resolved neither an identifier nor a person-name column.
    Schema { file: String, message: String },
    /// Every file of one side was skipped; matching did not run.
    NoUsableFiles { side: Side, reasons: Vec<String> },
    /// A report sink failed. The computed result is unaffected.
    ReportWrite(String),
    /// IO error (file read, etc.).
    Io(String),
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Load { file, message } => write!(f, "cannot load '{file}': {message}"),
            Self::Schema { file, message } => write!(f, "'{file}': {message}"),
            Self::NoUsableFiles { side, reasons } => {
                write!(f, "no usable {side} files")?;
                if !reasons.is_empty() {
                    write!(f, " ({})", reasons.join("; "))?;
                }
                Ok(())
            }
            Self::ReportWrite(msg) => write!(f, "report write error: {msg}"),
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
