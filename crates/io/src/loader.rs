use std::path::Path;

use hcrecon_recon::model::TabularRecordSet;
use hcrecon_recon::sink::TabularLoader;
use hcrecon_recon::ReconError;

use crate::table::record_set_from_grid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    Delimited,
    Spreadsheet,
}

impl InputFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "csv" | "tsv" | "txt" => Some(Self::Delimited),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

/// Loads CSV/TSV and spreadsheet files from disk, format chosen by extension.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLoader;

impl TabularLoader for FileLoader {
    fn load(&self, path: &Path) -> Result<TabularRecordSet, ReconError> {
        let label = path.display().to_string();
        let load_err = |message: String| ReconError::Load {
            file: label.clone(),
            message,
        };

        let format = InputFormat::from_path(path).ok_or_else(|| {
            load_err(format!(
                "unsupported file type '{}'",
                path.extension().and_then(|e| e.to_str()).unwrap_or("")
            ))
        })?;
        let grid = match format {
            InputFormat::Delimited => crate::csv::read_grid(path),
            InputFormat::Spreadsheet => crate::xlsx::read_grid(path),
        }
        .map_err(load_err)?;

        let set = record_set_from_grid(&label, grid).map_err(load_err)?;
        log::info!("loaded {} ({} rows)", set.file_name, set.rows.len());
        Ok(set)
    }
}
