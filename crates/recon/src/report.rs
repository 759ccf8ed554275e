//! Discrepancy report builder: a pure projection, sort and aggregate over a
//! `MatchResult`. No matching happens here.

use std::cmp::Ordering;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Serialize, Serializer};

use crate::evidence::{compute_summary, ReconSummary};
use crate::matcher::MatchResult;
use crate::model::{CellValue, RawRow, Record, RecordId, Side};
use crate::pool::RecordPool;

/// One unexplained record as it appears in a discrepancy table.
#[derive(Debug, Clone, Serialize)]
pub struct ReportRow {
    pub record_id: RecordId,
    pub identifier: String,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub amount_cents: Option<i64>,
    pub origin_file: String,
    pub dialect: Option<String>,
    #[serde(serialize_with = "extras_as_map")]
    pub extras: Vec<(String, String)>,
    pub raw: RawRow,
    #[serde(skip)]
    projected: Arc<Vec<String>>,
}

fn extras_as_map<S: Serializer>(extras: &[(String, String)], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_map(extras.iter().map(|(k, v)| (k, v)))
}

impl ReportRow {
    pub fn from_record(record: &Record) -> Self {
        Self {
            record_id: record.id.clone(),
            identifier: record.identifier_text.clone(),
            name: record.name.clone(),
            date: record.date,
            amount_cents: record.amount_cents,
            origin_file: record.origin_file.clone(),
            dialect: record.dialect.clone(),
            extras: record.extras.clone(),
            raw: record.raw.clone(),
            projected: Arc::clone(&record.projected),
        }
    }

    pub fn extra(&self, name: &str) -> Option<&str> {
        self.extras
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Raw columns not already shown through a canonical column.
    fn unprojected(&self) -> impl Iterator<Item = &str> {
        self.raw
            .columns()
            .iter()
            .map(String::as_str)
            .filter(|c| !self.projected.iter().any(|p| p == c))
    }
}

/// Present dates first (ascending), absent dates last.
fn cmp_dates(a: Option<NaiveDate>, b: Option<NaiveDate>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A flattened table ready for a report sink.
#[derive(Debug, Clone)]
pub struct Grid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiscrepancyTable {
    pub side: Side,
    pub rows: Vec<ReportRow>,
}

impl DiscrepancyTable {
    /// Rows for `ids`, stably sorted by (name, date).
    pub fn build(side: Side, ids: &[RecordId], pool: &RecordPool) -> Self {
        let mut rows: Vec<ReportRow> = ids
            .iter()
            .filter_map(|id| pool.get(id))
            .map(ReportRow::from_record)
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| cmp_dates(a.date, b.date)));
        Self { side, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of amounts; rows without an amount count as zero.
    pub fn total_cents(&self) -> i64 {
        self.rows.iter().filter_map(|r| r.amount_cents).sum()
    }

    /// Grid layout: identifier, name, extras, amount, origin_file, date,
    /// dialect (source only), then leftover raw columns in first-seen order.
    pub fn to_grid(&self) -> Grid {
        let mut extra_names: Vec<&str> = Vec::new();
        for row in &self.rows {
            for (name, _) in &row.extras {
                if !extra_names.contains(&name.as_str()) {
                    extra_names.push(name);
                }
            }
        }

        let mut headers: Vec<String> = vec!["identifier".into(), "name".into()];
        headers.extend(extra_names.iter().map(|s| s.to_string()));
        headers.extend(["amount", "origin_file", "date"].map(String::from));
        if self.side == Side::Source {
            headers.push("dialect".into());
        }

        // (header, raw column)
        let mut raw_columns: Vec<(String, &str)> = Vec::new();
        for row in &self.rows {
            for col in row.unprojected() {
                if raw_columns.iter().any(|(_, c)| *c == col) {
                    continue;
                }
                let header = if headers.iter().any(|h| h == col) {
                    format!("{col} (raw)")
                } else {
                    col.to_string()
                };
                raw_columns.push((header, col));
            }
        }
        headers.extend(raw_columns.iter().map(|(h, _)| h.clone()));

        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut cells = vec![
                    CellValue::Text(row.identifier.clone()),
                    CellValue::Text(row.name.clone()),
                ];
                for name in &extra_names {
                    cells.push(row.extra(name).map_or(CellValue::Empty, |v| CellValue::Text(v.to_string())));
                }
                cells.push(row.amount_cents.map_or(CellValue::Empty, |c| CellValue::Number(c as f64 / 100.0)));
                cells.push(CellValue::Text(row.origin_file.clone()));
                cells.push(row.date.map_or(CellValue::Empty, CellValue::Date));
                if self.side == Side::Source {
                    cells.push(CellValue::Text(row.dialect.clone().unwrap_or_default()));
                }
                for (_, col) in &raw_columns {
                    cells.push(row.raw.get(col).cloned().unwrap_or(CellValue::Empty));
                }
                cells
            })
            .collect();

        Grid { headers, rows }
    }
}

/// The two canonical artifacts plus summary statistics.
#[derive(Debug, Clone, Serialize)]
pub struct DiscrepancyReport {
    /// Control-only records: visits owed to the control holder.
    pub control_owed: DiscrepancyTable,
    /// Source-only records: unexplained credit.
    pub source_unexplained: DiscrepancyTable,
    pub summary: ReconSummary,
}

pub fn build_report(result: &MatchResult, control: &RecordPool, source: &RecordPool) -> DiscrepancyReport {
    let control_owed = DiscrepancyTable::build(Side::Control, &result.control_only, control);
    let source_unexplained = DiscrepancyTable::build(Side::Source, &result.source_only, source);
    let summary = compute_summary(result, control, source, &control_owed, &source_unexplained);
    DiscrepancyReport {
        control_owed,
        source_unexplained,
        summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::match_pools;
    use crate::model::TabularRecordSet;
    use crate::pool::build_file_pool;
    use crate::schema::{resolve, AliasTable};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.into())
    }

    fn pool(side: Side, label: &str, columns: &[&str], rows: Vec<Vec<&str>>) -> RecordPool {
        let set = TabularRecordSet::new(
            label,
            columns.iter().map(|s| s.to_string()).collect(),
            rows.into_iter()
                .map(|r| r.into_iter().map(text).collect())
                .collect(),
        );
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, side, &[]).unwrap();
        RecordPool::from_files(side, vec![file])
    }

    #[test]
    fn tables_sorted_by_name_then_date_absent_last() {
        let control = pool(
            Side::Control,
            "control.csv",
            &["HC", "Paciente", "Fecha", "Monto"],
            vec![
                vec!["3", "ZAPATA", "01/03/2024", "100"],
                vec!["1", "ACOSTA", "", "50"],
                vec!["2", "ACOSTA", "05/03/2024", "25,50"],
            ],
        );
        let source = pool(Side::Source, "source.csv", &["HC", "Paciente"], vec![]);
        let result = match_pools(&control, &source);
        let report = build_report(&result, &control, &source);

        let names: Vec<(&str, &str)> = report
            .control_owed
            .rows
            .iter()
            .map(|r| (r.name.as_str(), r.identifier.as_str()))
            .collect();
        assert_eq!(names, vec![("ACOSTA", "2"), ("ACOSTA", "1"), ("ZAPATA", "3")]);
        assert_eq!(report.control_owed.total_cents(), 17_550);
        assert!(report.source_unexplained.is_empty());
    }

    #[test]
    fn grid_layout_and_unprojected_columns() {
        let control = pool(Side::Control, "c.csv", &["HC", "Paciente"], vec![]);
        let source = pool(
            Side::Source,
            "hospital_pami.csv",
            &["Historia", "Paciente", "Plan", "Medico", "Fecha", "Monto"],
            vec![vec!["9", "LOPEZ", "PAMI 1", "DR X", "02/03/2024", "1.000,00"]],
        );
        let result = match_pools(&control, &source);
        let report = build_report(&result, &control, &source);
        let grid = report.source_unexplained.to_grid();

        assert_eq!(
            grid.headers,
            vec!["identifier", "name", "coverage", "amount", "origin_file", "date", "dialect", "Medico"]
        );
        let row = &grid.rows[0];
        assert_eq!(row[0], text("9"));
        assert_eq!(row[2], text("PAMI 1"));
        assert_eq!(row[3], CellValue::Number(1000.0));
        assert_eq!(row[4], text("hospital_pami.csv"));
        assert_eq!(row[5], CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 2).unwrap()));
        assert_eq!(row[7], text("DR X"));
    }

    #[test]
    fn raw_column_colliding_with_canonical_header_is_renamed() {
        let control = pool(
            Side::Control,
            "c.csv",
            &["HC", "Paciente", "amount"],
            vec![vec!["1", "A", "x"]],
        );
        let source = pool(Side::Source, "s.csv", &["HC", "Paciente"], vec![]);
        let result = match_pools(&control, &source);
        let report = build_report(&result, &control, &source);
        let grid = report.control_owed.to_grid();
        // "amount" resolves as the amount role only through "monto"/"importe", so it stays raw.
        assert!(grid.headers.contains(&"amount (raw)".to_string()));
    }
}
