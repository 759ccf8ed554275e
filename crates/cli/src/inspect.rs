//! `hcrecon inspect`: per-file column listing and role resolution.

use std::path::{Path, PathBuf};

use clap::Args;
use serde::Serialize;

use hcrecon_io::FileLoader;
use hcrecon_recon::model::ColumnRole;
use hcrecon_recon::schema::{resolve, ResolvedSchema};
use hcrecon_recon::sink::TabularLoader;
use hcrecon_recon::ReconConfig;

use crate::exit_codes::EXIT_NO_USABLE_FILES;
use crate::CliError;

#[derive(Args)]
pub struct InspectArgs {
    /// Files to inspect (.csv, .tsv, .txt, .xlsx, .xls, .ods, ...)
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Resolve with this dialect's alias table instead of classifying by file name
    #[arg(long)]
    pub dialect: Option<String>,

    /// Take dialects from this config instead of the built-in ones
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Output JSON array to stdout
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct FileReport {
    file: String,
    dialect: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    rows: usize,
    columns: Vec<String>,
    #[serde(flatten)]
    schema: ResolvedSchema,
    usable: bool,
}

fn inspect_file(config: &ReconConfig, path: &Path, forced: Option<&str>) -> FileReport {
    let file = path.display().to_string();
    let set = match FileLoader.load(path) {
        Ok(set) => set,
        Err(e) => {
            return FileReport {
                file,
                dialect: None,
                error: Some(e.to_string()),
                rows: 0,
                columns: Vec::new(),
                schema: ResolvedSchema::default(),
                usable: false,
            }
        }
    };

    let dialect = match forced {
        Some(name) => config.dialects.iter().find(|d| d.name == name),
        None => config.classify(&set.file_name),
    };
    let schema = resolve(&set.columns, &config.alias_table_for(dialect));
    FileReport {
        file,
        dialect: dialect.map(|d| d.name.clone()),
        error: None,
        rows: set.rows.len(),
        columns: set.columns.to_vec(),
        usable: schema.is_usable(),
        schema,
    }
}

fn print_human(report: &FileReport) {
    println!("{}", report.file);
    if let Some(error) = &report.error {
        println!("  error:   {error}");
        return;
    }
    println!("  dialect: {}", report.dialect.as_deref().unwrap_or("default"));
    println!("  rows:    {}", report.rows);
    println!("  columns: {}", report.columns.join(", "));
    for role in ColumnRole::ALL {
        let column = report.schema.column(role).unwrap_or("-");
        println!("  {:<12} <- {column}", role.to_string());
    }
    for (name, column) in &report.schema.extras {
        println!("  {name:<12} <- {column}");
    }
    println!("  usable:  {}", if report.usable { "yes" } else { "no" });
}

pub fn cmd_inspect(args: InspectArgs) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => ReconConfig::load(path)?,
        None => ReconConfig::default(),
    };
    if let Some(name) = &args.dialect {
        if !config.dialects.iter().any(|d| &d.name == name) {
            let known: Vec<&str> = config.dialects.iter().map(|d| d.name.as_str()).collect();
            return Err(CliError::usage(format!("unknown dialect '{name}'"))
                .with_hint(format!("known dialects: {}", known.join(", "))));
        }
    }

    let reports: Vec<FileReport> = args
        .files
        .iter()
        .map(|path| inspect_file(&config, path, args.dialect.as_deref()))
        .collect();

    if args.json {
        let json_str = serde_json::to_string_pretty(&reports)
            .map_err(|e| CliError::new(crate::exit_codes::EXIT_REPORT_WRITE, e.to_string()))?;
        println!("{json_str}");
    } else {
        for report in &reports {
            print_human(report);
        }
    }

    let unusable = reports.iter().filter(|r| !r.usable).count();
    if unusable > 0 {
        return Err(CliError::new(
            EXIT_NO_USABLE_FILES,
            format!("{unusable} of {} file(s) cannot yield records", reports.len()),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_and_resolves_by_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hospital_pami_marzo.csv");
        std::fs::write(&path, "HC;Apellido_Nombre;Nombre;Hono_Impu1\n1;DR X;PEREZ;100\n").unwrap();

        let report = inspect_file(&ReconConfig::default(), &path, None);
        assert_eq!(report.dialect.as_deref(), Some("pami"));
        assert_eq!(report.schema.column(ColumnRole::PersonName), Some("Nombre"));
        assert_eq!(report.schema.column(ColumnRole::Amount), Some("Hono_Impu1"));
        assert!(report.usable);
    }

    #[test]
    fn forced_dialect_overrides_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, "HC;Paciente;Fecha\n1;PEREZ;01/03/2024\n").unwrap();

        let report = inspect_file(&ReconConfig::default(), &path, Some("planes"));
        assert_eq!(report.dialect.as_deref(), Some("planes"));
        assert_eq!(report.rows, 1);
    }

    #[test]
    fn unreadable_file_is_reported_not_fatal() {
        let report = inspect_file(&ReconConfig::default(), Path::new("nada.csv"), None);
        assert!(report.error.is_some());
        assert!(!report.usable);
    }
}
