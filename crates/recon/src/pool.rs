//! Record pools: normalized, queryable records for one side of a run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ReconError;
use crate::model::{
    CellValue, ColumnRole, KeyIdentity, NormalizationWarning, NormalizedKey, Record, RecordId,
    Side, TabularRecordSet,
};
use crate::normalize::{normalize_date, normalize_identifier, normalize_name, parse_amount_cents};
use crate::schema::ResolvedSchema;

/// Records promoted from a single file.
#[derive(Debug)]
pub struct FilePool {
    pub label: String,
    pub records: Vec<Record>,
    pub warnings: Vec<NormalizationWarning>,
    /// Rows dropped by the presence filter.
    pub filtered: usize,
}

/// Promote every row of `set` into a record using its resolved schema.
///
/// Fails with `ReconError::Schema` when the file has neither an identifier
/// nor a person-name column, or when a presence filter is active on the
/// control side and the file has no status column.
pub fn build_file_pool(
    set: &TabularRecordSet,
    schema: &ResolvedSchema,
    side: Side,
    present_statuses: &[String],
) -> Result<FilePool, ReconError> {
    if !schema.is_usable() {
        return Err(ReconError::Schema {
            file: set.file_name.clone(),
            message: "no identifier or person-name column".into(),
        });
    }

    let status_col = schema.column(ColumnRole::Status);
    let filter_active = side == Side::Control && !present_statuses.is_empty();
    if filter_active && status_col.is_none() {
        return Err(ReconError::Schema {
            file: set.file_name.clone(),
            message: "presence filter configured but no status column".into(),
        });
    }
    let present: Vec<String> = present_statuses
        .iter()
        .map(|s| s.trim().to_uppercase())
        .collect();

    let id_col = schema.column(ColumnRole::Identifier);
    let name_col = schema.column(ColumnRole::PersonName);
    let date_col = schema.column(ColumnRole::Date);
    let amount_col = schema.column(ColumnRole::Amount);
    let projected = Arc::new(schema.projected_columns());

    let mut records = Vec::with_capacity(set.rows.len());
    let mut warnings = Vec::new();
    let mut filtered = 0;

    for (row_idx, row) in set.rows.iter().enumerate() {
        if filter_active {
            let status = row.value(status_col).to_string().trim().to_uppercase();
            if !present.contains(&status) {
                filtered += 1;
                continue;
            }
        }

        let id_cell = row.value(id_col);
        let key = normalize_identifier(id_cell);
        // Digits only reach a freeform key when the run overflows a record number.
        if matches!(&key, NormalizedKey::Freeform(s) if s.chars().any(|c| c.is_ascii_digit())) {
            warnings.push(warning(set, row_idx, ColumnRole::Identifier, id_cell));
        }
        let name = normalize_name(row.value(name_col));

        let date_cell = row.value(date_col);
        let date = normalize_date(date_cell);
        if date.is_none() && !date_cell.is_blank() {
            warnings.push(warning(set, row_idx, ColumnRole::Date, date_cell));
        }

        let amount_cell = row.value(amount_col);
        let amount_cents = parse_amount_cents(amount_cell);
        if amount_cents.is_none() && !amount_cell.is_blank() {
            warnings.push(warning(set, row_idx, ColumnRole::Amount, amount_cell));
        }

        let extras = schema
            .extras
            .iter()
            .map(|(name, col)| (name.clone(), row.value(Some(col)).to_string().trim().to_string()))
            .collect();

        records.push(Record {
            id: RecordId::new(&set.label, row_idx, &key),
            side,
            origin_file: set.file_name.clone(),
            origin_row: row_idx,
            dialect: set.dialect.clone(),
            key,
            name,
            date,
            amount_cents,
            identifier_text: id_cell.to_string().trim().to_string(),
            extras,
            projected: Arc::clone(&projected),
            raw: row.clone(),
        });
    }

    for w in &warnings {
        log::debug!(
            "{}: row {} {} value '{}' not understood",
            w.file,
            w.row,
            w.role,
            w.value
        );
    }

    Ok(FilePool {
        label: set.label.clone(),
        records,
        warnings,
        filtered,
    })
}

fn warning(set: &TabularRecordSet, row: usize, role: ColumnRole, value: &CellValue) -> NormalizationWarning {
    NormalizationWarning {
        file: set.file_name.clone(),
        row,
        role,
        value: value.to_string(),
    }
}

/// All records of one side, in file order then row order.
#[derive(Debug)]
pub struct RecordPool {
    side: Side,
    records: Vec<Record>,
    by_id: HashMap<RecordId, usize>,
    pub filtered: usize,
    pub warnings: Vec<NormalizationWarning>,
}

impl RecordPool {
    pub fn new(side: Side) -> Self {
        Self {
            side,
            records: Vec::new(),
            by_id: HashMap::new(),
            filtered: 0,
            warnings: Vec::new(),
        }
    }

    pub fn from_files(side: Side, files: Vec<FilePool>) -> Self {
        let mut pool = Self::new(side);
        for file in files {
            pool.extend(file);
        }
        pool
    }

    pub fn extend(&mut self, file: FilePool) {
        self.filtered += file.filtered;
        self.warnings.extend(file.warnings);
        for record in file.records {
            debug_assert_eq!(record.side, self.side);
            self.by_id.insert(record.id.clone(), self.records.len());
            self.records.push(record);
        }
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &RecordId) -> Option<&Record> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    /// Positions of matchable records by key identity, in pool order.
    pub fn key_index(&self) -> HashMap<KeyIdentity, Vec<usize>> {
        let mut index: HashMap<KeyIdentity, Vec<usize>> = HashMap::new();
        for (i, record) in self.records.iter().enumerate() {
            if let Some(identity) = record.key.identity() {
                index.entry(identity).or_default().push(i);
            }
        }
        index
    }

    /// Positions of records with a non-empty name, in pool order.
    pub fn name_index(&self) -> HashMap<String, Vec<usize>> {
        let mut index: HashMap<String, Vec<usize>> = HashMap::new();
        for (i, record) in self.records.iter().enumerate() {
            if !record.name.is_empty() {
                index.entry(record.name.clone()).or_default().push(i);
            }
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{resolve, AliasTable};

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.into())
    }

    fn control_set() -> TabularRecordSet {
        TabularRecordSet::new(
            "control.csv",
            vec!["HC".into(), "Paciente".into(), "Fecha".into(), "Estado".into(), "Monto".into()],
            vec![
                vec![text("123"), text("perez"), text("01/03/2024"), text("P"), text("1.500,00")],
                vec![text("124"), text("gomez"), text("mañana"), text("a"), text("")],
                vec![text(""), text(""), text(""), text("p"), text("abc")],
            ],
        )
    }

    #[test]
    fn builds_records_with_normalized_fields() {
        let set = control_set();
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, Side::Control, &[]).unwrap();
        assert_eq!(file.records.len(), 3);
        let first = &file.records[0];
        assert_eq!(first.key, NormalizedKey::Numeric(123));
        assert_eq!(first.name, "PEREZ");
        assert_eq!(first.amount_cents, Some(150_000));
        assert_eq!(first.id.as_str(), "control.csv#0#123");
        assert!(file.records[2].is_noise());
        // "mañana" date and "abc" amount
        assert_eq!(file.warnings.len(), 2);
    }

    #[test]
    fn oversized_identifier_warns_and_keeps_row() {
        let set = TabularRecordSet::new(
            "source.csv",
            vec!["HC".into(), "Paciente".into()],
            vec![
                vec![text("123456789012345678901234"), text("perez")],
                vec![text("particular"), text("gomez")],
            ],
        );
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, Side::Source, &[]).unwrap();
        assert_eq!(file.records.len(), 2);
        assert!(matches!(file.records[0].key, NormalizedKey::Freeform(_)));
        assert_eq!(file.warnings.len(), 1);
        assert_eq!(file.warnings[0].role, ColumnRole::Identifier);
        assert_eq!(file.warnings[0].row, 0);
        assert_eq!(file.warnings[0].value, "123456789012345678901234");
    }

    #[test]
    fn presence_filter_keeps_present_rows() {
        let set = control_set();
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, Side::Control, &["P".to_string()]).unwrap();
        assert_eq!(file.records.len(), 2);
        assert_eq!(file.filtered, 1);
        // Origin rows keep their position in the file.
        assert_eq!(file.records[1].origin_row, 2);
    }

    #[test]
    fn presence_filter_ignored_on_source_side() {
        let set = control_set();
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, Side::Source, &["P".to_string()]).unwrap();
        assert_eq!(file.records.len(), 3);
    }

    #[test]
    fn schema_errors() {
        let set = TabularRecordSet::new("x.csv", vec!["Fecha".into()], vec![vec![text("01/01/2024")]]);
        let schema = resolve(&set.columns, &AliasTable::standard());
        let err = build_file_pool(&set, &schema, Side::Source, &[]).unwrap_err();
        assert!(matches!(err, ReconError::Schema { .. }));

        let set = TabularRecordSet::new("y.csv", vec!["HC".into()], vec![vec![text("1")]]);
        let schema = resolve(&set.columns, &AliasTable::standard());
        let err = build_file_pool(&set, &schema, Side::Control, &["P".to_string()]).unwrap_err();
        assert!(err.to_string().contains("status"));
    }

    #[test]
    fn pool_lookup_and_indexes() {
        let set = control_set();
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, Side::Control, &[]).unwrap();
        let pool = RecordPool::from_files(Side::Control, vec![file]);
        assert_eq!(pool.len(), 3);
        let id = pool.records()[1].id.clone();
        assert_eq!(pool.get(&id).map(|r| r.name.as_str()), Some("GOMEZ"));
        assert_eq!(pool.key_index().len(), 2);
        assert_eq!(pool.name_index().get("PEREZ"), Some(&vec![0]));
    }
}
