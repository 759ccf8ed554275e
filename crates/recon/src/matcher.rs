use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::model::{KeyIdentity, Record, RecordId};
use crate::pool::RecordPool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Identifier,
    Name,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchedPair {
    pub control: RecordId,
    pub source: RecordId,
    pub rule: MatchRule,
}

/// Partition of both pools. Every record id lands in exactly one list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchResult {
    pub matched: Vec<MatchedPair>,
    /// Claimed by the control ledger, unexplained by any source row ("a favor").
    pub control_only: Vec<RecordId>,
    /// Present in a source extract, unexplained by the control ledger ("en contra").
    pub source_only: Vec<RecordId>,
    /// Rows with neither identifier nor name; excluded from both lists.
    pub control_noise: Vec<RecordId>,
    pub source_noise: Vec<RecordId>,
}

impl MatchResult {
    pub fn matched_by(&self, rule: MatchRule) -> usize {
        self.matched.iter().filter(|m| m.rule == rule).count()
    }
}

/// A date can only reject a candidate when it is known on both sides.
fn dates_agree(a: Option<NaiveDate>, b: Option<NaiveDate>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

/// Sole owner of the unconsumed control records.
///
/// Candidate lists hold pool positions in pool order and only ever shrink,
/// so a control record can be handed out at most once.
pub struct ConsumptionIndex<'p> {
    records: &'p [Record],
    by_key: HashMap<KeyIdentity, Vec<usize>>,
    by_name: HashMap<String, Vec<usize>>,
    consumed: Vec<bool>,
}

impl<'p> ConsumptionIndex<'p> {
    pub fn new(pool: &'p RecordPool) -> Self {
        Self {
            records: pool.records(),
            by_key: pool.key_index(),
            by_name: pool.name_index(),
            consumed: vec![false; pool.len()],
        }
    }

    /// First acceptable control candidate for `source`, identifier rule first.
    pub fn find(&self, source: &Record) -> Option<(usize, MatchRule)> {
        if let Some(identity) = source.key.identity() {
            let by_key = self.by_key.get(&identity).and_then(|candidates| {
                candidates
                    .iter()
                    .copied()
                    .find(|&i| dates_agree(source.date, self.records[i].date))
            });
            if let Some(i) = by_key {
                return Some((i, MatchRule::Identifier));
            }
        }

        if source.name.is_empty() {
            return None;
        }
        self.by_name.get(&source.name).and_then(|candidates| {
            candidates
                .iter()
                .copied()
                // Names only decide when the identifier could not.
                .filter(|&i| !(source.key.is_present() && self.records[i].key.is_present()))
                .find(|&i| dates_agree(source.date, self.records[i].date))
                .map(|i| (i, MatchRule::Name))
        })
    }

    pub fn consume(&mut self, i: usize) {
        if self.consumed[i] {
            return;
        }
        self.consumed[i] = true;
        let record = &self.records[i];
        if let Some(identity) = record.key.identity() {
            remove_position(&mut self.by_key, &identity, i);
        }
        if !record.name.is_empty() {
            remove_position(&mut self.by_name, &record.name, i);
        }
    }

    pub fn is_consumed(&self, i: usize) -> bool {
        self.consumed[i]
    }
}

fn remove_position<K>(index: &mut HashMap<K, Vec<usize>>, key: &K, i: usize)
where
    K: std::hash::Hash + Eq,
{
    if let Some(list) = index.get_mut(key) {
        if let Some(pos) = list.iter().position(|&j| j == i) {
            list.remove(pos);
        }
        if list.is_empty() {
            index.remove(key);
        }
    }
}

/// Greedy first-fit matching of source records against control records.
///
/// Source records are visited in pool order. Each consumes the first
/// unconsumed control record that shares its identifier (or, failing that,
/// its name) and whose date does not contradict it. No backtracking.
pub fn match_pools(control: &RecordPool, source: &RecordPool) -> MatchResult {
    let mut index = ConsumptionIndex::new(control);
    let mut result = MatchResult::default();

    for s in source.records() {
        if s.is_noise() {
            result.source_noise.push(s.id.clone());
            continue;
        }
        match index.find(s) {
            Some((i, rule)) => {
                index.consume(i);
                result.matched.push(MatchedPair {
                    control: control.records()[i].id.clone(),
                    source: s.id.clone(),
                    rule,
                });
            }
            None => result.source_only.push(s.id.clone()),
        }
    }

    for (i, c) in control.records().iter().enumerate() {
        if c.is_noise() {
            result.control_noise.push(c.id.clone());
        } else if !index.is_consumed(i) {
            result.control_only.push(c.id.clone());
        }
    }

    log::info!(
        "matched {} ({} by identifier, {} by name); {} control-only, {} source-only",
        result.matched.len(),
        result.matched_by(MatchRule::Identifier),
        result.matched_by(MatchRule::Name),
        result.control_only.len(),
        result.source_only.len(),
    );

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CellValue, Side, TabularRecordSet};
    use crate::pool::build_file_pool;
    use crate::schema::{resolve, AliasTable};

    fn pool(side: Side, rows: &[(&str, &str, &str)]) -> RecordPool {
        let set = TabularRecordSet::new(
            format!("{side}.csv"),
            vec!["HC".into(), "Paciente".into(), "Fecha".into()],
            rows.iter()
                .map(|(hc, name, date)| {
                    vec![
                        CellValue::Text(hc.to_string()),
                        CellValue::Text(name.to_string()),
                        CellValue::Text(date.to_string()),
                    ]
                })
                .collect(),
        );
        let schema = resolve(&set.columns, &AliasTable::standard());
        let file = build_file_pool(&set, &schema, side, &[]).unwrap();
        RecordPool::from_files(side, vec![file])
    }

    #[test]
    fn identifier_match_with_date_absent_on_one_side() {
        let control = pool(Side::Control, &[("123", "PEREZ", "01/03/2024")]);
        let source = pool(Side::Source, &[("123", "PEREZ", "")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].rule, MatchRule::Identifier);
        assert!(result.control_only.is_empty());
        assert!(result.source_only.is_empty());
    }

    #[test]
    fn conflicting_date_skips_to_next_candidate() {
        let control = pool(
            Side::Control,
            &[("500", "LOPEZ", "10/03/2024"), ("500", "LOPEZ", "02/03/2024")],
        );
        let source = pool(Side::Source, &[("500", "LOPEZ", "02/03/2024")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].control, control.records()[1].id);
        assert_eq!(result.control_only, vec![control.records()[0].id.clone()]);
    }

    #[test]
    fn first_candidate_wins_without_dates() {
        let control = pool(Side::Control, &[("7", "A", ""), ("7", "A", "")]);
        let source = pool(Side::Source, &[("7", "A", "")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched[0].control, control.records()[0].id);
    }

    #[test]
    fn identifier_preferred_over_name() {
        // Control 0 shares only the name (no identifier), control 1 shares the identifier.
        let control = pool(Side::Control, &[("", "RUIZ", ""), ("42", "OTRO", "")]);
        let source = pool(Side::Source, &[("42", "RUIZ", "")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched[0].control, control.records()[1].id);
        assert_eq!(result.matched[0].rule, MatchRule::Identifier);
    }

    #[test]
    fn name_fallback_only_when_an_identifier_is_missing() {
        let control = pool(Side::Control, &[("", "DIAZ", ""), ("10", "SOSA", "")]);
        let source = pool(Side::Source, &[("99", "DIAZ", ""), ("11", "SOSA", "")]);
        let result = match_pools(&control, &source);
        // DIAZ: control has no identifier, names agree -> match by name.
        // SOSA: both identifiers present and different -> name is not consulted.
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.matched[0].rule, MatchRule::Name);
        assert_eq!(result.source_only.len(), 1);
        assert_eq!(result.control_only.len(), 1);
    }

    #[test]
    fn no_identifier_payloads_must_agree() {
        let control = pool(Side::Control, &[("0 sin hc juan", "", "")]);
        let source = pool(Side::Source, &[("sin HC Juan", "", "")]);
        let result = match_pools(&control, &source);
        assert!(result.matched.is_empty());
        assert_eq!(result.control_only.len(), 1);
        assert_eq!(result.source_only.len(), 1);

        let control = pool(Side::Control, &[("Sin HC Juan", "", "")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched.len(), 1);
    }

    #[test]
    fn noise_rows_are_excluded_on_both_sides() {
        let control = pool(Side::Control, &[("", "", "01/01/2024"), ("1", "A", "")]);
        let source = pool(Side::Source, &[("", "", ""), ("1", "A", "")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.control_noise.len(), 1);
        assert_eq!(result.source_noise.len(), 1);
        assert!(result.control_only.is_empty());
        assert!(result.source_only.is_empty());
    }

    #[test]
    fn each_control_record_consumed_once() {
        let control = pool(Side::Control, &[("5", "X", "")]);
        let source = pool(Side::Source, &[("5", "X", ""), ("5", "X", ""), ("", "X", "")]);
        let result = match_pools(&control, &source);
        assert_eq!(result.matched.len(), 1);
        assert_eq!(result.source_only.len(), 2);
    }
}
