// hcrecon CLI - reconcile attended visits against provider settlements

mod exit_codes;
mod inspect;
mod recon;

use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{recon_exit_code, EXIT_SUCCESS, EXIT_USAGE};
use hcrecon_recon::ReconError;

#[derive(Parser)]
#[command(name = "hcrecon")]
#[command(about = "Reconcile a control ledger of visits against provider settlement files")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Log per-file schema resolution and per-cell warnings
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a reconciliation
    #[command(after_help = "\
Examples:
  hcrecon run marzo.toml
  hcrecon run marzo.toml --json > resultado.json
  hcrecon run --control control.xlsx --source hospital_pami.xlsx --source hospital_planes.csv
  hcrecon run marzo.toml --source tardio_ooss.csv --progress
  hcrecon run --control control.xlsx --source hospital_pami.xlsx \\
      --control-owed presentes_no_pagados.xlsx --source-unexplained pagos_en_contra.xlsx

Exit codes:
  0  no discrepancies
  1  discrepancies found (reports and JSON are complete)
  3  invalid config
  4  a side has no usable files
  5  a report or the JSON output could not be written")]
    Run(recon::RunArgs),

    /// Validate a config without loading any file
    #[command(after_help = "\
Examples:
  hcrecon validate marzo.toml")]
    Validate {
        /// Path to the .toml config file
        config: std::path::PathBuf,
    },

    /// Show the columns of input files and how they resolve to roles
    #[command(after_help = "\
Examples:
  hcrecon inspect control.xlsx hospital_pami.xlsx
  hcrecon inspect export.csv --dialect planes
  hcrecon inspect *.xlsx --config marzo.toml --json

Without --dialect, each file is classified by its name like a source file.
Exits 4 when a file cannot be loaded or has neither an identifier nor a name column.")]
    Inspect(inspect::InspectArgs),
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:  hcrecon-recon ",
        env!("CARGO_PKG_VERSION"),
        "\ntarget:  ",
        env!("TARGET"),
    )
}

fn init_logging(quiet: bool, verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => recon::cmd_run(args),
        Commands::Validate { config } => recon::cmd_validate(config),
        Commands::Inspect(args) => inspect::cmd_inspect(args),
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let hint = match &err {
            ReconError::NoUsableFiles { .. } => {
                Some("run `hcrecon inspect` on the files to see which columns were recognized".to_string())
            }
            ReconError::ConfigParse(_) => Some("check the TOML syntax of the config file".to_string()),
            _ => None,
        };
        Self {
            code: recon_exit_code(&err),
            message: err.to_string(),
            hint,
        }
    }
}
