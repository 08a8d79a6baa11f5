// Field-by-field comparison of a matched row pair.

use crate::model::Row;
use crate::reconcile::normalize::Normalizer;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// Normalized values of one differing column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDiff {
    pub source: Option<String>,
    pub destination: Option<String>,
}

pub type FieldDiffs = BTreeMap<String, FieldDiff>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    Matching,
    Different(FieldDiffs),
    MissingInDestination,
    ExtraInDestination,
}

#[derive(Debug, Clone, Default)]
pub struct Differ {
    excluded: Vec<String>,
    normalizer: Normalizer,
}

impl Differ {
    pub fn new(excluded: Vec<String>, normalizer: Normalizer) -> Self {
        Self {
            excluded,
            normalizer,
        }
    }

    pub fn diff(&self, source: &Row, destination: &Row) -> FieldDiffs {
        self.plan(&source.columns, &destination.columns)
            .diff(source, destination)
    }

    pub fn classify(&self, source: &Row, destination: &Row) -> RowOutcome {
        let diffs = self.diff(source, destination);
        if diffs.is_empty() {
            RowOutcome::Matching
        } else {
            RowOutcome::Different(diffs)
        }
    }

    // Precompute field positions for two fixed column layouts.
    pub fn plan(&self, source_columns: &[String], destination_columns: &[String]) -> DiffPlan {
        let mut fields = Vec::new();
        let names = source_columns
            .iter()
            .chain(destination_columns.iter().filter(|c| !source_columns.contains(*c)));
        for name in names {
            if self.excluded.iter().any(|e| e == name) {
                continue;
            }
            fields.push(PlannedField {
                name: name.clone(),
                source: source_columns.iter().position(|c| c == name),
                destination: destination_columns.iter().position(|c| c == name),
            });
        }
        DiffPlan {
            source_columns: source_columns.to_vec(),
            destination_columns: destination_columns.to_vec(),
            fields,
            differ: self.clone(),
        }
    }
}

#[derive(Debug, Clone)]
struct PlannedField {
    name: String,
    source: Option<usize>,
    destination: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct DiffPlan {
    source_columns: Vec<String>,
    destination_columns: Vec<String>,
    fields: Vec<PlannedField>,
    differ: Differ,
}

impl DiffPlan {
    pub fn diff(&self, source: &Row, destination: &Row) -> FieldDiffs {
        if source.columns != self.source_columns || destination.columns != self.destination_columns
        {
            return self
                .differ
                .plan(&source.columns, &destination.columns)
                .diff(source, destination);
        }

        let norm = self.differ.normalizer;
        let mut out = FieldDiffs::new();
        for field in &self.fields {
            let s = norm.value(field.source.and_then(|i| source.values[i].as_deref()));
            let d = norm.value(field.destination.and_then(|i| destination.values[i].as_deref()));
            if s != d {
                out.insert(
                    field.name.clone(),
                    FieldDiff {
                        source: s.map(|v| v.into_owned()),
                        destination: d.map(|v| v.into_owned()),
                    },
                );
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Option<&str>)]) -> Row {
        Row::new(
            "s",
            "t",
            pairs.iter().map(|(c, _)| c.to_string()).collect(),
            pairs.iter().map(|(_, v)| v.map(str::to_string)).collect(),
        )
    }

    #[test]
    fn equal_after_trim_is_matching() {
        let a = row(&[("id", Some("1")), ("name", Some("Alice "))]);
        let b = row(&[("id", Some("1")), ("name", Some(" Alice"))]);
        assert_eq!(Differ::default().classify(&a, &b), RowOutcome::Matching);
    }

    #[test]
    fn reports_normalized_values() {
        let a = row(&[("id", Some("2")), ("name", Some("Bob"))]);
        let b = row(&[("id", Some("2")), ("name", Some("Bobby "))]);
        let diffs = Differ::default().diff(&a, &b);
        assert_eq!(diffs.len(), 1);
        assert_eq!(
            diffs["name"],
            FieldDiff {
                source: Some("Bob".into()),
                destination: Some("Bobby".into()),
            }
        );
    }

    #[test]
    fn null_differs_from_empty_string() {
        let a = row(&[("note", None)]);
        let b = row(&[("note", Some(""))]);
        let diffs = Differ::default().diff(&a, &b);
        assert_eq!(diffs["note"].source, None);
        assert_eq!(diffs["note"].destination.as_deref(), Some(""));
    }

    #[test]
    fn excluded_fields_and_column_union() {
        let a = row(&[("employee_id", Some("E1")), ("x", Some("1"))]);
        let b = row(&[("contractor_id", Some("C9")), ("x", Some("1")), ("extra", Some("y"))]);
        let differ = Differ::new(
            vec!["employee_id".into(), "contractor_id".into()],
            Normalizer::default(),
        );
        let diffs = differ.diff(&a, &b);
        assert_eq!(diffs.keys().collect::<Vec<_>>(), vec!["extra"]);
        assert_eq!(diffs["extra"].source, None);
    }

    #[test]
    fn plan_falls_back_for_other_layouts() {
        let differ = Differ::default();
        let plan = differ.plan(&["a".to_string()], &["a".to_string()]);
        let a = row(&[("b", Some("1")), ("a", Some("x"))]);
        let b = row(&[("a", Some("y"))]);
        let diffs = plan.diff(&a, &b);
        assert_eq!(diffs.len(), 2);
    }
}
