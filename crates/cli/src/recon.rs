//! `hcrecon run` and `hcrecon validate`.

use std::path::{Path, PathBuf};

use clap::Args;

use hcrecon_io::{sinks_for, FileLoader};
use hcrecon_recon::evidence::format_cents;
use hcrecon_recon::sink::{NoProgress, ProgressSink};
use hcrecon_recon::{ReconConfig, ReconOutcome};

use crate::exit_codes::{EXIT_DISCREPANCIES, EXIT_REPORT_WRITE};
use crate::CliError;

#[derive(Args)]
pub struct RunArgs {
    /// Path to the .toml config file. Optional when --control and --source are given
    pub config: Option<PathBuf>,

    /// Control ledger file (repeatable). Added to the config's control files
    #[arg(long, value_name = "FILE")]
    pub control: Vec<PathBuf>,

    /// Provider settlement file (repeatable). Added to the config's source files
    #[arg(long, value_name = "FILE")]
    pub source: Vec<PathBuf>,

    /// Write the control-owed report here, .xlsx or .csv (overrides [output] control_owed)
    #[arg(long, value_name = "FILE")]
    pub control_owed: Option<PathBuf>,

    /// Write the unexplained-source report here, .xlsx or .csv (overrides [output] source_unexplained)
    #[arg(long, value_name = "FILE")]
    pub source_unexplained: Option<PathBuf>,

    /// Print the full outcome as JSON to stdout
    #[arg(long)]
    pub json: bool,

    /// Write the full outcome as JSON to this file (overrides [output] json)
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Log a milestone after each processed file
    #[arg(long)]
    pub progress: bool,
}

/// Forwards engine milestones to the log.
struct LogProgress;

impl ProgressSink for LogProgress {
    fn milestone(&self, message: &str) {
        log::info!("{message}");
    }
}

/// Config from file (if any) plus files given on the command line, validated.
fn build_config(args: &RunArgs) -> Result<ReconConfig, CliError> {
    let mut config = match &args.config {
        Some(path) => ReconConfig::load(path)?,
        None => ReconConfig::default(),
    };
    config.control.files.extend(args.control.iter().cloned());
    config.source.files.extend(args.source.iter().cloned());
    if let Some(path) = &args.control_owed {
        config.output.control_owed = Some(path.clone());
    }
    if let Some(path) = &args.source_unexplained {
        config.output.source_unexplained = Some(path.clone());
    }

    config.validate().map_err(|e| {
        let err = CliError::from(e);
        if args.config.is_none() {
            err.with_hint("without a config, pass at least one --control and one --source file")
        } else {
            err
        }
    })?;
    Ok(config)
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let config = build_config(&args)?;
    let sinks = sinks_for(&config.output)?;

    let progress: &dyn ProgressSink = if args.progress { &LogProgress } else { &NoProgress };
    let outcome = hcrecon_recon::run(&config, &FileLoader, progress)?;

    // A failed write does not invalidate the outcome; remember it and keep going.
    let mut write_failures: Vec<String> = Vec::new();
    for sink in &sinks {
        if let Err(e) = sink.write(&outcome.report) {
            log::error!("{e}");
            write_failures.push(e.to_string());
        }
    }

    let json_path = args.output.as_ref().or(config.output.json.as_ref());
    if args.json || json_path.is_some() {
        let json_str = serde_json::to_string_pretty(&outcome)
            .map_err(|e| CliError::new(EXIT_REPORT_WRITE, format!("JSON serialization error: {e}")))?;

        if let Some(path) = json_path {
            match std::fs::write(path, &json_str) {
                Ok(()) => eprintln!("wrote {}", path.display()),
                Err(e) => write_failures.push(format!("cannot write {}: {e}", path.display())),
            }
        }
        if args.json {
            println!("{json_str}");
        }
    }

    print_summary(&outcome);

    if !write_failures.is_empty() {
        return Err(CliError::new(EXIT_REPORT_WRITE, write_failures.join("; ")));
    }
    if outcome.has_discrepancies() {
        return Err(CliError::new(EXIT_DISCREPANCIES, "discrepancies found"));
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(outcome: &ReconOutcome) {
    let s = &outcome.report.summary;
    eprintln!(
        "recon '{}': {} control / {} source record(s), {} matched ({} by identifier, {} by name)",
        outcome.meta.config_name,
        s.control_records,
        s.source_records,
        s.matched,
        s.matched_by_identifier,
        s.matched_by_name,
    );
    eprintln!(
        "owed to control:    {} record(s), {}",
        s.control_owed.count,
        format_cents(s.control_owed.amount_cents),
    );
    eprintln!(
        "unexplained source: {} record(s), {}",
        s.source_unexplained.count,
        format_cents(s.source_unexplained.amount_cents),
    );
    for (dialect, totals) in &s.by_dialect {
        eprintln!(
            "  {dialect}: {} record(s), {} matched, {} unexplained ({})",
            totals.records,
            totals.matched,
            totals.unexplained,
            format_cents(totals.unexplained_amount_cents),
        );
    }
    if s.control_noise + s.source_noise > 0 {
        eprintln!(
            "ignored {} control / {} source row(s) without identifier or name",
            s.control_noise, s.source_noise,
        );
    }
    if s.control_filtered > 0 {
        eprintln!("presence filter dropped {} control row(s)", s.control_filtered);
    }
    if !outcome.issues.is_empty() {
        eprintln!("skipped {} file(s):", outcome.issues.len());
        for issue in &outcome.issues {
            eprintln!("  {issue}");
        }
    }
    if s.warnings > 0 {
        eprintln!("{} cell(s) could not be normalized (see --json warnings)", s.warnings);
    }
}

pub fn cmd_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = ReconConfig::load(&config_path)?;
    config.validate()?;

    eprintln!(
        "valid: recon '{}' with {} control file(s), {} source file(s), {} dialect(s)",
        config.name,
        config.control.files.len(),
        config.source.files.len(),
        config.dialects.len(),
    );
    for path in missing_files(&config) {
        eprintln!("  note: {} does not exist yet", path.display());
    }
    Ok(())
}

fn missing_files(config: &ReconConfig) -> Vec<&Path> {
    config
        .control
        .files
        .iter()
        .chain(config.source.files.iter())
        .map(PathBuf::as_path)
        .filter(|p| !p.exists())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit_codes::{EXIT_INVALID_CONFIG, EXIT_NO_USABLE_FILES};

    fn args(config: Option<&Path>, control: &[&str], source: &[&str]) -> RunArgs {
        RunArgs {
            config: config.map(Path::to_path_buf),
            control: control.iter().map(PathBuf::from).collect(),
            source: source.iter().map(PathBuf::from).collect(),
            control_owed: None,
            source_unexplained: None,
            json: false,
            output: None,
            progress: false,
        }
    }

    #[test]
    fn flags_alone_make_a_config() {
        let config = build_config(&args(None, &["c.csv"], &["hospital_pami.csv"])).unwrap();
        assert_eq!(config.control.files, vec![PathBuf::from("c.csv")]);
        assert_eq!(config.source.files, vec![PathBuf::from("hospital_pami.csv")]);
        assert_eq!(config.dialects.len(), 3);
    }

    #[test]
    fn report_flags_override_config_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recon.toml");
        std::fs::write(
            &path,
            "[control]\nfiles = [\"c.csv\"]\n[source]\nfiles = [\"s.csv\"]\n\
             [output]\ncontrol_owed = \"owed.xlsx\"\nsource_unexplained = \"extra.xlsx\"\n",
        )
        .unwrap();

        let mut run = args(Some(&path), &[], &[]);
        run.control_owed = Some(PathBuf::from("presentes_no_pagados.csv"));
        let config = build_config(&run).unwrap();
        assert_eq!(config.output.control_owed, Some(PathBuf::from("presentes_no_pagados.csv")));
        assert_eq!(config.output.source_unexplained, Some(dir.path().join("extra.xlsx")));
    }

    #[test]
    fn report_flag_with_bad_extension_is_invalid_config() {
        let mut run = args(None, &["c.csv"], &["s.csv"]);
        run.source_unexplained = Some(PathBuf::from("pagos_en_contra.pdf"));
        let err = build_config(&run).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
        assert!(err.message.contains("pagos_en_contra.pdf"));
    }

    #[test]
    fn missing_side_is_invalid_config_with_hint() {
        let err = build_config(&args(None, &["c.csv"], &[])).unwrap_err();
        assert_eq!(err.code, EXIT_INVALID_CONFIG);
        assert!(err.hint.is_some());
    }

    #[test]
    fn flags_extend_config_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("recon.toml");
        std::fs::write(&path, "[control]\nfiles = [\"c.csv\"]\n[source]\nfiles = [\"s.csv\"]\n").unwrap();

        let config = build_config(&args(Some(&path), &[], &["extra.csv"])).unwrap();
        assert_eq!(config.source.files.len(), 2);
        assert_eq!(config.source.files[0], dir.path().join("s.csv"));
        assert_eq!(config.source.files[1], PathBuf::from("extra.csv"));
    }

    #[test]
    fn all_source_files_missing_exits_no_usable_files() {
        let dir = tempfile::tempdir().unwrap();
        let control = dir.path().join("control.csv");
        std::fs::write(&control, "HC;Paciente\n1;PEREZ\n").unwrap();
        let missing = dir.path().join("nada.csv");

        let err = cmd_run(args(
            None,
            &[control.to_str().unwrap()],
            &[missing.to_str().unwrap()],
        ))
        .unwrap_err();
        assert_eq!(err.code, EXIT_NO_USABLE_FILES);
    }
}
