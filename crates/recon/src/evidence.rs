use std::collections::BTreeMap;

use serde::Serialize;

use crate::matcher::{MatchResult, MatchRule};
use crate::model::Record;
use crate::pool::RecordPool;
use crate::report::DiscrepancyTable;

/// Dialect key used for source files that matched no dialect pattern.
pub const DEFAULT_DIALECT: &str = "default";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableTotals {
    pub count: usize,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DialectTotals {
    pub records: usize,
    pub matched: usize,
    pub unexplained: usize,
    pub unexplained_amount_cents: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconSummary {
    pub control_records: usize,
    pub source_records: usize,
    pub control_amount_cents: i64,
    pub source_amount_cents: i64,
    pub matched: usize,
    pub matched_by_identifier: usize,
    pub matched_by_name: usize,
    pub control_owed: TableTotals,
    pub source_unexplained: TableTotals,
    pub control_noise: usize,
    pub source_noise: usize,
    pub control_filtered: usize,
    pub warnings: usize,
    pub by_dialect: BTreeMap<String, DialectTotals>,
}

fn amount_of(records: &[Record]) -> i64 {
    records.iter().filter_map(|r| r.amount_cents).sum()
}

fn dialect_key(record: &Record) -> String {
    record
        .dialect
        .clone()
        .unwrap_or_else(|| DEFAULT_DIALECT.to_string())
}

/// Compute summary statistics from a match result and its tables.
pub fn compute_summary(
    result: &MatchResult,
    control: &RecordPool,
    source: &RecordPool,
    control_owed: &DiscrepancyTable,
    source_unexplained: &DiscrepancyTable,
) -> ReconSummary {
    let mut by_dialect: BTreeMap<String, DialectTotals> = BTreeMap::new();
    for record in source.records() {
        by_dialect.entry(dialect_key(record)).or_default().records += 1;
    }
    for pair in &result.matched {
        if let Some(record) = source.get(&pair.source) {
            by_dialect.entry(dialect_key(record)).or_default().matched += 1;
        }
    }
    for row in &source_unexplained.rows {
        let key = row.dialect.clone().unwrap_or_else(|| DEFAULT_DIALECT.to_string());
        let totals = by_dialect.entry(key).or_default();
        totals.unexplained += 1;
        totals.unexplained_amount_cents += row.amount_cents.unwrap_or(0);
    }

    ReconSummary {
        control_records: control.len(),
        source_records: source.len(),
        control_amount_cents: amount_of(control.records()),
        source_amount_cents: amount_of(source.records()),
        matched: result.matched.len(),
        matched_by_identifier: result.matched_by(MatchRule::Identifier),
        matched_by_name: result.matched_by(MatchRule::Name),
        control_owed: TableTotals {
            count: control_owed.len(),
            amount_cents: control_owed.total_cents(),
        },
        source_unexplained: TableTotals {
            count: source_unexplained.len(),
            amount_cents: source_unexplained.total_cents(),
        },
        control_noise: result.control_noise.len(),
        source_noise: result.source_noise.len(),
        control_filtered: control.filtered,
        warnings: control.warnings.len() + source.warnings.len(),
        by_dialect,
    }
}

/// Format cents as a currency amount with two decimals.
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
