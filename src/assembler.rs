// Table assembly: group extracted rows by (schema, table) and conform each
// group to one column list. Rows are never dropped here.

use crate::model::{Row, SchemaSet, Table};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

// How to pick a table's column list when its rows disagree.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnPolicy {
    // Union of all observed columns in first-seen order; values are placed by
    // column name and absent columns become null.
    #[default]
    Union,
    // Longest observed column list; values are padded with null or truncated
    // positionally.
    Longest,
}

pub type TableKey = (String, String);

pub fn assemble(rows: Vec<Row>, policy: ColumnPolicy) -> BTreeMap<TableKey, Table> {
    let mut groups: BTreeMap<TableKey, Vec<Row>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.schema.clone(), row.table.clone()))
            .or_default()
            .push(row);
    }

    groups
        .into_iter()
        .map(|(key, rows)| {
            let table = assemble_table(&key.0, &key.1, rows, policy);
            (key, table)
        })
        .collect()
}

// Assemble rows straight into a schema set keyed by schema name.
pub fn assemble_schemas(rows: Vec<Row>, policy: ColumnPolicy) -> SchemaSet {
    let mut set = SchemaSet::default();
    for ((schema, _), table) in assemble(rows, policy) {
        set.schema_mut(&schema).insert(table);
    }
    set
}

fn assemble_table(schema: &str, name: &str, rows: Vec<Row>, policy: ColumnPolicy) -> Table {
    let mut warnings = Vec::new();
    let first = rows.first().map(|r| r.columns.clone()).unwrap_or_default();
    let mismatched = rows.iter().filter(|r| r.columns != first).count();
    if mismatched > 0 {
        let msg = format!(
            "{} of {} rows in {}.{} carry a different column list",
            mismatched,
            rows.len(),
            schema,
            name
        );
        warn!("assemble: {}", msg);
        warnings.push(msg);
    }

    let columns = match policy {
        ColumnPolicy::Union => union_columns(&rows),
        ColumnPolicy::Longest => rows
            .iter()
            .map(|r| &r.columns)
            .fold(first.clone(), |best, cols| {
                if cols.len() > best.len() {
                    cols.clone()
                } else {
                    best
                }
            }),
    };

    let mut table = Table::new(schema, name, columns);
    table.warnings = warnings;
    table.rows = rows
        .into_iter()
        .map(|row| conform(row, &table.columns, policy))
        .collect();
    debug!(
        "assemble: {}.{} -> {} rows x {} columns",
        schema,
        name,
        table.rows.len(),
        table.columns.len()
    );
    table
}

fn union_columns(rows: &[Row]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for row in rows {
        for col in &row.columns {
            if !out.contains(col) {
                out.push(col.clone());
            }
        }
    }
    out
}

fn conform(row: Row, columns: &[String], policy: ColumnPolicy) -> Row {
    if row.columns == columns {
        return row;
    }
    let values = match policy {
        ColumnPolicy::Union => columns
            .iter()
            .map(|c| row.position(c).and_then(|i| row.values[i].clone()))
            .collect(),
        ColumnPolicy::Longest => row.values,
    };
    Row::new(row.schema, row.table, columns.to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(table: &str, cols: &[&str], vals: &[Option<&str>]) -> Row {
        Row::new(
            "src",
            table,
            cols.iter().map(|c| c.to_string()).collect(),
            vals.iter().map(|v| v.map(str::to_string)).collect(),
        )
    }

    #[test]
    fn groups_by_schema_and_table() {
        let rows = vec![
            row("a", &["id"], &[Some("1")]),
            row("b", &["id"], &[Some("2")]),
            row("a", &["id"], &[Some("3")]),
        ];
        let tables = assemble(rows, ColumnPolicy::Union);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[&("src".into(), "a".into())].len(), 2);
        assert!(tables[&("src".into(), "a".into())].warnings.is_empty());
    }

    #[test]
    fn union_policy_places_values_by_name() {
        let rows = vec![
            row("t", &["id", "name"], &[Some("1"), Some("x")]),
            row("t", &["id", "email"], &[Some("2"), Some("e")]),
        ];
        let tables = assemble(rows, ColumnPolicy::Union);
        let t = &tables[&("src".into(), "t".into())];
        assert_eq!(t.columns, vec!["id", "name", "email"]);
        assert_eq!(t.rows.len(), 2);
        assert_eq!(t.rows[1].get("name"), Some(None));
        assert_eq!(t.rows[1].get("email"), Some(Some("e")));
        assert_eq!(t.warnings.len(), 1);
    }

    #[test]
    fn longest_policy_pads_positionally() {
        let rows = vec![
            row("t", &["id"], &[Some("1")]),
            row("t", &["id", "name"], &[Some("2"), Some("y")]),
        ];
        let tables = assemble(rows, ColumnPolicy::Longest);
        let t = &tables[&("src".into(), "t".into())];
        assert_eq!(t.columns, vec!["id", "name"]);
        assert_eq!(t.rows[0].values, vec![Some("1".to_string()), None]);
    }

    #[test]
    fn schema_set_collects_tables() {
        let mut a = row("t", &["id"], &[Some("1")]);
        a.schema = "dst".into();
        let set = assemble_schemas(vec![row("t", &["id"], &[Some("1")]), a], ColumnPolicy::Union);
        assert_eq!(set.names(), vec!["dst", "src"]);
    }
}
