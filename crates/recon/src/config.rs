use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReconError;
use crate::model::ColumnRole;
use crate::schema::{AliasSet, AliasTable, ExtraColumn};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub control: ControlConfig,
    #[serde(default)]
    pub source: SourceConfig,
    /// Replaces the built-in dialects when present.
    #[serde(default = "builtin_dialects")]
    pub dialects: Vec<DialectConfig>,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_name() -> String {
    "reconciliation".into()
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            control: ControlConfig::default(),
            source: SourceConfig::default(),
            dialects: builtin_dialects(),
            output: OutputConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Sides
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControlConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
    /// Status values that mark a visit as present. Empty keeps every row.
    #[serde(default)]
    pub present_statuses: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub files: Vec<PathBuf>,
}

// ---------------------------------------------------------------------------
// Dialects
// ---------------------------------------------------------------------------

/// A counterpart-system file convention, selected by file name.
#[derive(Debug, Clone, Deserialize)]
pub struct DialectConfig {
    pub name: String,
    /// Case-insensitive substring of the file name.
    pub file_pattern: String,
    #[serde(default)]
    pub base: AliasBase,
    #[serde(default)]
    pub aliases: AliasOverrides,
    /// Replaces the base table's extra columns when non-empty.
    #[serde(default)]
    pub extra_columns: Vec<ExtraColumn>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AliasBase {
    #[default]
    Standard,
    Hospital,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AliasOverrides {
    pub identifier: Option<AliasSet>,
    pub person_name: Option<AliasSet>,
    pub date: Option<AliasSet>,
    pub amount: Option<AliasSet>,
    pub status: Option<AliasSet>,
}

impl AliasOverrides {
    fn get(&self, role: ColumnRole) -> Option<&AliasSet> {
        match role {
            ColumnRole::Identifier => self.identifier.as_ref(),
            ColumnRole::PersonName => self.person_name.as_ref(),
            ColumnRole::Date => self.date.as_ref(),
            ColumnRole::Amount => self.amount.as_ref(),
            ColumnRole::Status => self.status.as_ref(),
        }
    }
}

impl DialectConfig {
    fn builtin(name: &str) -> Self {
        Self {
            name: name.into(),
            file_pattern: name.into(),
            base: AliasBase::Hospital,
            aliases: AliasOverrides::default(),
            extra_columns: Vec::new(),
        }
    }

    pub fn alias_table(&self) -> AliasTable {
        let mut table = match self.base {
            AliasBase::Standard => AliasTable::standard(),
            AliasBase::Hospital => AliasTable::hospital(),
        };
        for role in ColumnRole::ALL {
            if let Some(set) = self.aliases.get(role) {
                *table.for_role_mut(role) = set.clone();
            }
        }
        if !self.extra_columns.is_empty() {
            table.extras = self.extra_columns.clone();
        }
        table
    }
}

/// The three hospital extract kinds.
pub fn builtin_dialects() -> Vec<DialectConfig> {
    ["planes", "pami", "ooss"]
        .iter()
        .map(|name| DialectConfig::builtin(name))
        .collect()
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub control_owed: Option<PathBuf>,
    #[serde(default)]
    pub source_unexplained: Option<PathBuf>,
    #[serde(default)]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Xlsx,
    Csv,
}

impl ReportFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Parse + Validate
// ---------------------------------------------------------------------------

impl ReconConfig {
    /// Deserialize without validating. Callers that add files afterwards
    /// must call [`ReconConfig::validate`] themselves.
    pub fn parse(input: &str) -> Result<Self, ReconError> {
        toml::from_str(input).map_err(|e| ReconError::ConfigParse(e.to_string()))
    }

    pub fn from_toml(input: &str) -> Result<Self, ReconError> {
        let config = Self::parse(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a config file. Relative file paths are resolved against its directory.
    pub fn load(path: &Path) -> Result<Self, ReconError> {
        let input = std::fs::read_to_string(path)
            .map_err(|e| ReconError::Io(format!("{}: {e}", path.display())))?;
        let mut config = Self::parse(&input)?;
        if let Some(dir) = path.parent() {
            config.resolve_paths(dir);
        }
        Ok(config)
    }

    pub fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        self.control.files.iter_mut().for_each(join);
        self.source.files.iter_mut().for_each(join);
        for p in [
            &mut self.output.control_owed,
            &mut self.output.source_unexplained,
            &mut self.output.json,
        ]
        .into_iter()
        .flatten()
        {
            join(p);
        }
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.control.files.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one control file is required".into(),
            ));
        }
        if self.source.files.is_empty() {
            return Err(ReconError::ConfigValidation(
                "at least one source file is required".into(),
            ));
        }
        for (side, files) in [("control", &self.control.files), ("source", &self.source.files)] {
            let mut seen = HashSet::new();
            if let Some(repeat) = files.iter().find(|p| !seen.insert(p.as_path())) {
                return Err(ReconError::ConfigValidation(format!(
                    "{side}.files: '{}' is listed more than once",
                    repeat.display()
                )));
            }
        }
        if self.control.present_statuses.iter().any(|s| s.trim().is_empty()) {
            return Err(ReconError::ConfigValidation(
                "control.present_statuses: blank status value".into(),
            ));
        }

        let mut names = HashSet::new();
        for dialect in &self.dialects {
            if dialect.name.trim().is_empty() {
                return Err(ReconError::ConfigValidation("dialect with empty name".into()));
            }
            if !names.insert(dialect.name.as_str()) {
                return Err(ReconError::ConfigValidation(format!(
                    "duplicate dialect '{}'",
                    dialect.name
                )));
            }
            if dialect.file_pattern.trim().is_empty() {
                return Err(ReconError::ConfigValidation(format!(
                    "dialect '{}': file_pattern must not be empty",
                    dialect.name
                )));
            }
            for role in ColumnRole::ALL {
                if dialect.aliases.get(role).is_some_and(AliasSet::is_empty) {
                    return Err(ReconError::ConfigValidation(format!(
                        "dialect '{}': aliases for '{role}' are empty",
                        dialect.name
                    )));
                }
            }
            for extra in &dialect.extra_columns {
                if extra.name.trim().is_empty() || extra.aliases.is_empty() {
                    return Err(ReconError::ConfigValidation(format!(
                        "dialect '{}': extra column needs a name and at least one alias",
                        dialect.name
                    )));
                }
            }
        }

        for (key, path) in [
            ("control_owed", &self.output.control_owed),
            ("source_unexplained", &self.output.source_unexplained),
        ] {
            if let Some(path) = path {
                if ReportFormat::from_path(path).is_none() {
                    return Err(ReconError::ConfigValidation(format!(
                        "output.{key}: '{}' must end in .xlsx or .csv",
                        path.display()
                    )));
                }
            }
        }

        Ok(())
    }

    /// First dialect whose pattern occurs in the lowercased file name.
    pub fn classify(&self, file_name: &str) -> Option<&DialectConfig> {
        let lower = file_name.to_lowercase();
        self.dialects
            .iter()
            .find(|d| lower.contains(&d.file_pattern.to_lowercase()))
    }

    pub fn alias_table_for(&self, dialect: Option<&DialectConfig>) -> AliasTable {
        dialect.map_or_else(AliasTable::standard, DialectConfig::alias_table)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
name = "Marzo 2024"

[control]
files = ["control/marzo.xlsx"]
present_statuses = ["P"]

[source]
files = ["hospital_pami.xlsx", "hospital_planes.csv"]

[output]
control_owed = "presentes_no_pagados.xlsx"
source_unexplained = "pagos_en_contra.csv"
json = "resultado.json"
"#;

    #[test]
    fn parse_valid_with_builtin_dialects() {
        let config = ReconConfig::from_toml(VALID).unwrap();
        assert_eq!(config.name, "Marzo 2024");
        assert_eq!(config.control.files.len(), 1);
        assert_eq!(config.control.present_statuses, vec!["P"]);
        assert_eq!(config.source.files.len(), 2);
        let names: Vec<&str> = config.dialects.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["planes", "pami", "ooss"]);
    }

    #[test]
    fn classify_by_file_name() {
        let config = ReconConfig::default();
        assert_eq!(config.classify("HOSPITAL_PAMI_marzo.xlsx").map(|d| d.name.as_str()), Some("pami"));
        assert_eq!(config.classify("hospital_ooss.xls").map(|d| d.name.as_str()), Some("ooss"));
        assert!(config.classify("control.xlsx").is_none());
    }

    #[test]
    fn builtin_dialect_uses_hospital_table() {
        let config = ReconConfig::default();
        let table = config.alias_table_for(config.classify("hospital_planes.xlsx"));
        assert_eq!(table, AliasTable::hospital());
        assert_eq!(config.alias_table_for(None), AliasTable::standard());
    }

    #[test]
    fn custom_dialect_overrides() {
        let input = format!(
            r#"{VALID}
[[dialects]]
name = "clinica"
file_pattern = "clinica"

[dialects.aliases.identifier]
exact = ["legajo"]

[[dialects.extra_columns]]
name = "sector"
contains = ["sector"]
"#
        );
        let config = ReconConfig::from_toml(&input).unwrap();
        assert_eq!(config.dialects.len(), 1);
        let table = config.dialects[0].alias_table();
        assert_eq!(table.identifier.exact, vec!["legajo"]);
        assert!(table.identifier.contains.is_empty());
        assert_eq!(table.person_name, AliasTable::standard().person_name);
        assert_eq!(table.extras.len(), 1);
        assert_eq!(table.extras[0].name, "sector");
        // Built-ins are replaced, not merged.
        assert!(config.classify("hospital_pami.xlsx").is_none());
    }

    #[test]
    fn reject_missing_files() {
        let err = ReconConfig::from_toml("name = \"x\"\n[source]\nfiles = [\"a.csv\"]\n").unwrap_err();
        assert!(err.to_string().contains("control file"));

        // parse alone accepts it; files may come from the command line.
        assert!(ReconConfig::parse("name = \"x\"").is_ok());
    }

    #[test]
    fn reject_repeated_file_on_one_side() {
        let input = VALID.replace(
            r#"files = ["hospital_pami.xlsx", "hospital_planes.csv"]"#,
            r#"files = ["hospital_pami.xlsx", "hospital_pami.xlsx"]"#,
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("source.files: 'hospital_pami.xlsx' is listed more than once"));

        // The same file may serve as control and source.
        let mut config = ReconConfig::from_toml(VALID).unwrap();
        config.source.files.push(config.control.files[0].clone());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reject_duplicate_dialect() {
        let input = format!(
            r#"{VALID}
[[dialects]]
name = "a"
file_pattern = "a"
[[dialects]]
name = "a"
file_pattern = "b"
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("duplicate dialect 'a'"));
    }

    #[test]
    fn reject_empty_alias_override() {
        let input = format!(
            r#"{VALID}
[[dialects]]
name = "a"
file_pattern = "a"
[dialects.aliases.date]
exclude = ["x"]
"#
        );
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("'date'"));
    }

    #[test]
    fn reject_unsupported_output_extension() {
        let input = VALID.replace("pagos_en_contra.csv", "pagos_en_contra.pdf");
        let err = ReconConfig::from_toml(&input).unwrap_err();
        assert!(err.to_string().contains("output.source_unexplained"));
    }

    #[test]
    fn reject_bad_toml() {
        let err = ReconConfig::from_toml("name = ").unwrap_err();
        assert!(matches!(err, ReconError::ConfigParse(_)));
    }

    #[test]
    fn load_resolves_relative_to_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("marzo.recon.toml");
        std::fs::write(&path, VALID).unwrap();
        let config = ReconConfig::load(&path).unwrap();
        assert_eq!(config.source.files[0], dir.path().join("hospital_pami.xlsx"));

        let err = ReconConfig::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(err, ReconError::Io(_)));
    }

    #[test]
    fn resolve_paths_against_config_dir() {
        let mut config = ReconConfig::from_toml(VALID).unwrap();
        config.resolve_paths(Path::new("/data/marzo"));
        assert_eq!(config.control.files[0], PathBuf::from("/data/marzo/control/marzo.xlsx"));
        assert_eq!(
            config.output.json.as_deref(),
            Some(Path::new("/data/marzo/resultado.json"))
        );
    }
}
