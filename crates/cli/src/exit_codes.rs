//! Exit code registry for `hcrecon`.
//!
//! Every process exit status the CLI can produce is defined here. Scripts
//! that wrap `hcrecon run` can rely on these values.
//!
//! | Range | Meaning |
//! |-------|---------|
//! | 0     | Reconciled, no discrepancies |
//! | 1     | Reconciled, discrepancies found |
//! | 2     | Usage error (bad flags, clap parse failure) |
//! | 3-9   | Run failures (config, inputs, outputs) |
//!
//! Exit 1 is a result, not a failure: the JSON outcome and the report files
//! are complete when it is returned.

// =============================================================================
// Results (0-1)
// =============================================================================

/// Every control record was explained by the source side and vice versa.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one record is owed or unexplained.
pub const EXIT_DISCREPANCIES: u8 = 1;

// =============================================================================
// Usage (2)
// =============================================================================

/// Invalid arguments. clap uses this code for its own parse errors.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Run failures (3-9)
// =============================================================================

/// Config file unreadable, malformed, or rejected by validation.
pub const EXIT_INVALID_CONFIG: u8 = 3;

/// Every file on one side failed to load or resolve.
pub const EXIT_NO_USABLE_FILES: u8 = 4;

/// A report or JSON output could not be written. The computed result is
/// still printed when JSON was requested on stdout.
pub const EXIT_REPORT_WRITE: u8 = 5;

// =============================================================================
// Engine error mapping
// =============================================================================

use hcrecon_recon::ReconError;

/// Map an engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) | ReconError::Io(_) => {
            EXIT_INVALID_CONFIG
        }
        ReconError::NoUsableFiles { .. } | ReconError::Load { .. } | ReconError::Schema { .. } => {
            EXIT_NO_USABLE_FILES
        }
        ReconError::ReportWrite(_) => EXIT_REPORT_WRITE,
    }
}
