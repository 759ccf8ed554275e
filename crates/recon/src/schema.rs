//! Schema resolution: classify a file's column labels into semantic roles.
//!
//! Each role has an ordered alias set. Columns are scanned in file order; an
//! exact label match wins over a substring match, and the first hit wins in
//! either pass. Column order in the source file is therefore part of the
//! input, not an accident of it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ColumnRole;

/// Trim, lowercase and join internal whitespace with `_`.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct AliasSet {
    /// Full labels, matched after normalization.
    #[serde(default)]
    pub exact: Vec<String>,
    /// Substring keywords, tried only when no exact alias matched.
    #[serde(default)]
    pub contains: Vec<String>,
    /// Labels never assigned to this role.
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl AliasSet {
    pub fn new(exact: &[&str], contains: &[&str]) -> Self {
        Self {
            exact: exact.iter().map(|s| s.to_string()).collect(),
            contains: contains.iter().map(|s| s.to_string()).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, labels: &[&str]) -> Self {
        self.exclude = labels.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.contains.is_empty()
    }

    /// First column claimed by this set, or `None`.
    pub fn find<'a>(&self, columns: &'a [String]) -> Option<&'a str> {
        let exact: Vec<String> = self.exact.iter().map(|a| normalize_label(a)).collect();
        let contains: Vec<String> = self.contains.iter().map(|a| normalize_label(a)).collect();
        let exclude: Vec<String> = self.exclude.iter().map(|a| normalize_label(a)).collect();

        let candidates: Vec<(&'a str, String)> = columns
            .iter()
            .map(|c| (c.as_str(), normalize_label(c)))
            .filter(|(_, norm)| !exclude.contains(norm))
            .collect();

        candidates
            .iter()
            .find(|(_, norm)| exact.contains(norm))
            .or_else(|| {
                candidates
                    .iter()
                    .find(|(_, norm)| contains.iter().any(|k| !k.is_empty() && norm.contains(k.as_str())))
            })
            .map(|(col, _)| *col)
    }
}

/// A named metadata column carried into the reports (coverage plan, office...).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ExtraColumn {
    pub name: String,
    #[serde(flatten)]
    pub aliases: AliasSet,
}

/// Alias sets for every role, plus extra metadata columns.
#[derive(Debug, Clone, PartialEq)]
pub struct AliasTable {
    pub identifier: AliasSet,
    pub person_name: AliasSet,
    pub date: AliasSet,
    pub amount: AliasSet,
    pub status: AliasSet,
    pub extras: Vec<ExtraColumn>,
}

impl AliasTable {
    /// Table for the control ledger and any file without a dialect.
    pub fn standard() -> Self {
        Self {
            identifier: AliasSet::new(
                &[
                    "hc",
                    "historia",
                    "historia clinica",
                    "historia clínica",
                    "hc_paciente",
                    "numero_historia",
                ],
                &["historia", "hist", "hc", "h.c"],
            ),
            person_name: AliasSet::new(
                &["paciente", "nombre", "apellido y nombre"],
                &["paciente", "nombre", "apellido", "patient", "name"],
            ),
            date: AliasSet::new(&["fecha"], &["fecha", "date", "dia", "day"]),
            amount: AliasSet::new(&["monto", "importe"], &["monto", "impu", "honor"]),
            status: AliasSet::new(&["estado", "status"], &["estado", "status", "situacion"]),
            extras: default_extras(),
        }
    }

    /// Hospital extracts: `apellido_nombre` names the physician, not the patient.
    pub fn hospital() -> Self {
        let mut table = Self::standard();
        table.person_name = AliasSet::new(
            &["nombre", "paciente"],
            &["paciente", "nombre", "patient", "name"],
        )
        .excluding(&["apellido_nombre"]);
        table.amount = AliasSet::new(&["hono_impu1", "monto", "importe"], &["monto", "impu", "honor"]);
        table
    }

    pub fn for_role(&self, role: ColumnRole) -> &AliasSet {
        match role {
            ColumnRole::Identifier => &self.identifier,
            ColumnRole::PersonName => &self.person_name,
            ColumnRole::Date => &self.date,
            ColumnRole::Amount => &self.amount,
            ColumnRole::Status => &self.status,
        }
    }

    pub fn for_role_mut(&mut self, role: ColumnRole) -> &mut AliasSet {
        match role {
            ColumnRole::Identifier => &mut self.identifier,
            ColumnRole::PersonName => &mut self.person_name,
            ColumnRole::Date => &mut self.date,
            ColumnRole::Amount => &mut self.amount,
            ColumnRole::Status => &mut self.status,
        }
    }
}

fn default_extras() -> Vec<ExtraColumn> {
    vec![
        ExtraColumn {
            name: "coverage".into(),
            aliases: AliasSet::new(&["cobertura"], &["cobertura", "obra", "social", "plan", "seguro"]),
        },
        ExtraColumn {
            name: "office".into(),
            aliases: AliasSet::new(&["consultorio"], &["consultorio", "consulta", "atencion", "servicio"]),
        },
    ]
}

/// Role -> column map for one file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedSchema {
    pub roles: BTreeMap<ColumnRole, String>,
    /// (extra-column name, file column), in alias-table order.
    pub extras: Vec<(String, String)>,
}

impl ResolvedSchema {
    pub fn column(&self, role: ColumnRole) -> Option<&str> {
        self.roles.get(&role).map(String::as_str)
    }

    /// A file needs an identifier or a person name to yield records.
    pub fn is_usable(&self) -> bool {
        self.roles.contains_key(&ColumnRole::Identifier)
            || self.roles.contains_key(&ColumnRole::PersonName)
    }

    /// Every file column that feeds a record field.
    pub fn projected_columns(&self) -> Vec<String> {
        let mut cols: Vec<String> = self.roles.values().cloned().collect();
        for (_, col) in &self.extras {
            if !cols.contains(col) {
                cols.push(col.clone());
            }
        }
        cols
    }
}

/// Resolve roles and extra columns for one file.
pub fn resolve(columns: &[String], table: &AliasTable) -> ResolvedSchema {
    let mut schema = ResolvedSchema::default();
    for role in ColumnRole::ALL {
        if let Some(col) = table.for_role(role).find(columns) {
            schema.roles.insert(role, col.to_string());
        }
    }
    for extra in &table.extras {
        if let Some(col) = extra.aliases.find(columns) {
            schema.extras.push((extra.name.clone(), col.to_string()));
        }
    }
    schema
}
