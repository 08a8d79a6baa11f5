// Row, table and schema types shared by every stage of a run.
//
// Values stay loosely typed: every cell is an optional string and `None`
// (SQL `NULL`) is kept distinct from the empty string all the way through
// comparison and reporting.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;

// One extracted row. `values` is aligned positionally with `columns`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub schema: String,
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Option<String>>,
}

impl Row {
    // Build a row, right-padding with nulls or truncating so that
    // `values.len() == columns.len()` always holds.
    pub fn new(
        schema: impl Into<String>,
        table: impl Into<String>,
        columns: Vec<String>,
        mut values: Vec<Option<String>>,
    ) -> Self {
        values.resize(columns.len(), None);
        Self {
            schema: schema.into(),
            table: table.into(),
            columns,
            values,
        }
    }

    pub fn position(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    // Value of a column. Outer `None` means the row has no such column.
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.position(column)
            .map(|i| self.values.get(i).and_then(|v| v.as_deref()))
    }

    pub fn snapshot(&self) -> RowSnapshot {
        RowSnapshot(
            self.columns
                .iter()
                .cloned()
                .zip(self.values.iter().cloned())
                .collect(),
        )
    }
}

// Ordered column → value view of a row, used in report samples.
// Serializes as a JSON object in column order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSnapshot(pub Vec<(String, Option<String>)>);

impl RowSnapshot {
    pub fn get(&self, column: &str) -> Option<Option<&str>> {
        self.0
            .iter()
            .find(|(c, _)| c == column)
            .map(|(_, v)| v.as_deref())
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(c, _)| c.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for RowSnapshot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (column, value) in &self.0 {
            map.serialize_entry(column, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for RowSnapshot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct SnapshotVisitor;

        impl<'de> Visitor<'de> for SnapshotVisitor {
            type Value = RowSnapshot;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to optional string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((column, value)) = access.next_entry::<String, Option<String>>()? {
                    entries.push((column, value));
                }
                Ok(RowSnapshot(entries))
            }
        }

        deserializer.deserialize_map(SnapshotVisitor)
    }
}

// All rows of one table within one schema, conformed to a single column list.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub schema: String,
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    // Input-shape problems recovered while assembling (column mismatches).
    pub warnings: Vec<String>,
}

impl Table {
    pub fn new(schema: impl Into<String>, name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns,
            rows: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }
}

// One side of a comparison: tables by name, plus any primary keys the
// extractor found declared in CREATE TABLE statements.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub name: String,
    pub tables: BTreeMap<String, Table>,
    pub declared_keys: BTreeMap<String, Vec<String>>,
}

impl Schema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    pub fn insert(&mut self, table: Table) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn row_count(&self) -> usize {
        self.tables.values().map(Table::len).sum()
    }
}

// Every schema seen in a run's inputs, by name.
#[derive(Debug, Clone, Default)]
pub struct SchemaSet {
    pub schemas: BTreeMap<String, Schema>,
}

impl SchemaSet {
    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn schema_mut(&mut self, name: &str) -> &mut Schema {
        self.schemas
            .entry(name.to_string())
            .or_insert_with(|| Schema::new(name))
    }

    pub fn names(&self) -> Vec<&str> {
        self.schemas.keys().map(String::as_str).collect()
    }
}
