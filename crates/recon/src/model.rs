use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Serialize, Serializer};

// ---------------------------------------------------------------------------
// Raw tabular input
// ---------------------------------------------------------------------------

/// A single cell as produced by a tabular loader.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

impl CellValue {
    /// True for `Empty`, whitespace-only text and NaN.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            Self::Number(n) => n.is_nan(),
            Self::Date(_) | Self::DateTime(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Text(s) => f.write_str(s),
            // Integers print without decimals
            Self::Number(n) if n.is_nan() => Ok(()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Self::Number(n) => write!(f, "{n}"),
            Self::Date(d) => write!(f, "{}", d.format("%d/%m/%Y")),
            Self::DateTime(dt) => write!(f, "{}", dt.format("%d/%m/%Y %H:%M:%S")),
        }
    }
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_none(),
            Self::Number(n) if n.is_nan() => serializer.serialize_none(),
            Self::Number(n) => serializer.serialize_f64(*n),
            Self::Text(s) => serializer.serialize_str(s),
            Self::Date(d) => serializer.serialize_str(&d.format("%Y-%m-%d").to_string()),
            Self::DateTime(dt) => {
                serializer.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string())
            }
        }
    }
}

/// One loaded row. Column labels are shared with the owning record set.
#[derive(Debug, Clone)]
pub struct RawRow {
    columns: Arc<Vec<String>>,
    values: Vec<CellValue>,
}

impl RawRow {
    pub fn new(columns: Arc<Vec<String>>, mut values: Vec<CellValue>) -> Self {
        values.resize(columns.len(), CellValue::Empty);
        Self { columns, values }
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Value of `column`, or `Empty` when the column is missing.
    pub fn value(&self, column: Option<&str>) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        column.and_then(|c| self.get(c)).unwrap_or(&EMPTY)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &CellValue)> {
        self.columns.iter().map(String::as_str).zip(self.values.iter())
    }

    pub fn is_blank(&self) -> bool {
        self.values.iter().all(CellValue::is_blank)
    }
}

impl Serialize for RawRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (column, value) in self.iter() {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

/// One loaded file: ordered rows with stable column labels.
#[derive(Debug, Clone)]
pub struct TabularRecordSet {
    /// Unique label for the file (usually its path). Part of every `RecordId`.
    pub label: String,
    /// Display name written to the `origin_file` report column.
    pub file_name: String,
    /// Dialect tag attached by classification before schema resolution.
    pub dialect: Option<String>,
    pub columns: Arc<Vec<String>>,
    pub rows: Vec<RawRow>,
}

impl TabularRecordSet {
    pub fn new(label: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let label = label.into();
        let file_name = std::path::Path::new(&label)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| label.clone());
        let columns = Arc::new(columns);
        let rows = rows
            .into_iter()
            .map(|values| RawRow::new(Arc::clone(&columns), values))
            .collect();
        Self {
            label,
            file_name,
            dialect: None,
            columns,
            rows,
        }
    }

    pub fn with_dialect(mut self, dialect: Option<String>) -> Self {
        self.dialect = dialect;
        self
    }
}

// ---------------------------------------------------------------------------
// Roles + sides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Control,
    Source,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Control => write!(f, "control"),
            Self::Source => write!(f, "source"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Identifier,
    PersonName,
    Date,
    Amount,
    Status,
}

impl ColumnRole {
    pub const ALL: [ColumnRole; 5] = [
        Self::Identifier,
        Self::PersonName,
        Self::Date,
        Self::Amount,
        Self::Status,
    ];
}

impl fmt::Display for ColumnRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Identifier => write!(f, "identifier"),
            Self::PersonName => write!(f, "person_name"),
            Self::Date => write!(f, "date"),
            Self::Amount => write!(f, "amount"),
            Self::Status => write!(f, "status"),
        }
    }
}

// ---------------------------------------------------------------------------
// Normalized keys
// ---------------------------------------------------------------------------

/// Canonical identifier of a row.
///
/// Equality is variant-and-payload equality, except that `Absent` is never
/// equal to anything (including another `Absent`). For that reason the type
/// is `PartialEq` only; use [`NormalizedKey::identity`] for hashing.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NormalizedKey {
    Numeric(u64),
    ZeroIdentifier(String),
    NoIdentifier(String),
    Freeform(String),
    Absent,
}

/// Hashable form of a present key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyIdentity {
    Numeric(u64),
    Zero(String),
    NoIdentifier(String),
    Freeform(String),
}

impl NormalizedKey {
    pub fn identity(&self) -> Option<KeyIdentity> {
        match self {
            Self::Numeric(n) => Some(KeyIdentity::Numeric(*n)),
            Self::ZeroIdentifier(s) => Some(KeyIdentity::Zero(s.clone())),
            Self::NoIdentifier(s) => Some(KeyIdentity::NoIdentifier(s.clone())),
            Self::Freeform(s) => Some(KeyIdentity::Freeform(s.clone())),
            Self::Absent => None,
        }
    }

    pub fn is_present(&self) -> bool {
        !matches!(self, Self::Absent)
    }
}

impl PartialEq for NormalizedKey {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a == b,
            (Self::ZeroIdentifier(a), Self::ZeroIdentifier(b)) => a == b,
            (Self::NoIdentifier(a), Self::NoIdentifier(b)) => a == b,
            (Self::Freeform(a), Self::Freeform(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for NormalizedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Numeric(n) => write!(f, "{n}"),
            Self::ZeroIdentifier(s) => write!(f, "zero:{s}"),
            Self::NoIdentifier(s) => write!(f, "none:{s}"),
            Self::Freeform(s) => write!(f, "free:{s}"),
            Self::Absent => write!(f, "absent"),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Stable identity of a record: file label + row index + key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(label: &str, row: usize, key: &NormalizedKey) -> Self {
        Self(format!("{label}#{row}#{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One row promoted into a pool.
#[derive(Debug, Clone)]
pub struct Record {
    pub id: RecordId,
    pub side: Side,
    pub origin_file: String,
    pub origin_row: usize,
    pub dialect: Option<String>,
    pub key: NormalizedKey,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub amount_cents: Option<i64>,
    /// Display text of the raw identifier cell.
    pub identifier_text: String,
    /// Extra metadata columns (coverage, office, ...) by extra-column name.
    pub extras: Vec<(String, String)>,
    /// Raw columns projected into one of the fields above.
    pub projected: Arc<Vec<String>>,
    pub raw: RawRow,
}

impl Record {
    /// No identifier and no name: the row cannot be explained either way.
    pub fn is_noise(&self) -> bool {
        !self.key.is_present() && self.name.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    Load,
    Schema,
}

/// A file that was skipped. Collected and reported after the run.
#[derive(Debug, Clone, Serialize)]
pub struct FileIssue {
    pub side: Side,
    pub file: String,
    pub kind: IssueKind,
    pub message: String,
}

impl fmt::Display for FileIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            IssueKind::Load => "load",
            IssueKind::Schema => "schema",
        };
        write!(f, "{} file '{}' skipped ({kind}): {}", self.side, self.file, self.message)
    }
}

/// A cell that failed to normalize. The row still takes part in matching.
#[derive(Debug, Clone, Serialize)]
pub struct NormalizationWarning {
    pub file: String,
    pub row: usize,
    pub role: ColumnRole,
    pub value: String,
}
