// Join key selection for one table comparison.
//
// Precedence: explicit per-table override, then a PRIMARY KEY declared in the
// dump, then the `_id` suffix heuristic, then the first column. The heuristic
// does not guarantee uniqueness; callers that need it should configure keys.

use crate::error::{ReconError, Result};
use crate::model::Table;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyOrigin {
    Explicit,
    Declared,
    // First `_id` column outside the exclusion set.
    IdSuffix,
    // First `_id` column, exclusions ignored.
    ExcludedIdSuffix,
    FirstColumn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Key {
    pub columns: Vec<String>,
    pub origin: KeyOrigin,
}

impl Key {
    pub fn single(column: impl Into<String>, origin: KeyOrigin) -> Self {
        Self {
            columns: vec![column.into()],
            origin,
        }
    }

    pub fn is_composite(&self) -> bool {
        self.columns.len() > 1
    }

    // Position of each key column in `columns`, `None` where absent.
    pub fn positions(&self, columns: &[String]) -> Vec<Option<usize>> {
        self.columns
            .iter()
            .map(|k| columns.iter().position(|c| c == k))
            .collect()
    }

    pub fn label(&self) -> String {
        self.columns.join(", ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct KeyResolver {
    exclusions: Vec<String>,
    overrides: BTreeMap<String, Vec<String>>,
}

impl KeyResolver {
    pub fn new(exclusions: Vec<String>) -> Self {
        Self {
            exclusions,
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_overrides(mut self, overrides: BTreeMap<String, Vec<String>>) -> Self {
        self.overrides = overrides;
        self
    }

    pub fn resolve(&self, source: &Table, destination: &Table) -> Result<Key> {
        self.resolve_with_declared(source, destination, None)
    }

    pub fn resolve_with_declared(
        &self,
        source: &Table,
        destination: &Table,
        declared: Option<&[String]>,
    ) -> Result<Key> {
        let columns = leading_columns(source)
            .filter(|c| !c.is_empty())
            .or_else(|| leading_columns(destination))
            .unwrap_or(&[]);
        if columns.is_empty() {
            return Err(ReconError::NoKeyAvailable {
                table: source.name.clone(),
            });
        }

        if let Some(explicit) = self.overrides.get(&source.name) {
            match match_columns(explicit, columns) {
                Some(cols) => {
                    return Ok(Key {
                        columns: cols,
                        origin: KeyOrigin::Explicit,
                    })
                }
                None => warn!(
                    "KeyResolver: configured key [{}] not found in {}, falling back",
                    explicit.join(", "),
                    source.name
                ),
            }
        }

        if let Some(pk) = declared.filter(|pk| !pk.is_empty()) {
            if let Some(cols) = match_columns(pk, columns) {
                debug!("KeyResolver: {} uses declared key [{}]", source.name, cols.join(", "));
                return Ok(Key {
                    columns: cols,
                    origin: KeyOrigin::Declared,
                });
            }
        }

        Ok(self.heuristic(columns))
    }

    // `_id` suffix heuristic over a fixed column list. `columns` must not be
    // empty.
    pub fn heuristic(&self, columns: &[String]) -> Key {
        let mut id_columns = columns.iter().filter(|c| c.ends_with("_id"));
        if let Some(col) = id_columns
            .clone()
            .find(|c| !self.exclusions.iter().any(|e| e == *c))
        {
            return Key::single(col.clone(), KeyOrigin::IdSuffix);
        }
        if let Some(col) = id_columns.next() {
            return Key::single(col.clone(), KeyOrigin::ExcludedIdSuffix);
        }
        Key::single(columns[0].clone(), KeyOrigin::FirstColumn)
    }
}

fn leading_columns(table: &Table) -> Option<&[String]> {
    match table.rows.first() {
        Some(row) => Some(row.columns.as_slice()),
        None if !table.columns.is_empty() => Some(table.columns.as_slice()),
        None => None,
    }
}

// Map requested key columns onto the table's spelling (case-insensitive, as
// dump PRIMARY KEY clauses are often lowercased). All must be present.
fn match_columns(wanted: &[String], columns: &[String]) -> Option<Vec<String>> {
    if wanted.is_empty() {
        return None;
    }
    wanted
        .iter()
        .map(|w| {
            columns
                .iter()
                .find(|c| *c == w)
                .or_else(|| columns.iter().find(|c| c.eq_ignore_ascii_case(w)))
                .cloned()
        })
        .collect()
}
