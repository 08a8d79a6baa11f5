// Row documents for a downstream semantic index. Writing them is best effort:
// a sink failure is logged and never changes a run's result.

use crate::error::Result;
use crate::model::{Row, SchemaSet};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub schema: String,
    pub table: String,
    pub row_id: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowDocument {
    // JSON object of column to value, in column order.
    pub content: String,
    pub metadata: DocumentMetadata,
}

impl RowDocument {
    pub fn from_row(row: &Row, row_id: usize) -> Result<Self> {
        Ok(Self {
            content: serde_json::to_string(&row.snapshot())?,
            metadata: DocumentMetadata {
                schema: row.schema.clone(),
                table: row.table.clone(),
                row_id,
            },
        })
    }
}

// One document per assembled row; `row_id` is the row's position in its table.
pub fn documents(set: &SchemaSet) -> Result<Vec<RowDocument>> {
    let mut docs = Vec::with_capacity(set.schemas.values().map(|s| s.row_count()).sum());
    for schema in set.schemas.values() {
        for table in schema.tables.values() {
            for (i, row) in table.rows.iter().enumerate() {
                docs.push(RowDocument::from_row(row, i)?);
            }
        }
    }
    Ok(docs)
}

pub trait RowIndex {
    fn store(&self, docs: &[RowDocument]) -> Result<()>;
}

// Appends documents to a JSONL file, one per line.
pub struct JsonlRowIndex {
    path: PathBuf,
}

impl JsonlRowIndex {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RowIndex for JsonlRowIndex {
    fn store(&self, docs: &[RowDocument]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut w = BufWriter::new(file);
        for doc in docs {
            serde_json::to_writer(&mut w, doc)?;
            w.write_all(b"\n")?;
        }
        w.flush()?;
        Ok(())
    }
}

// Index every row of `set`, logging instead of failing.
pub fn index_rows(set: &SchemaSet, sink: &dyn RowIndex) -> usize {
    let result = documents(set).and_then(|docs| sink.store(&docs).map(|_| docs.len()));
    match result {
        Ok(n) => {
            info!("Indexed {} rows", n);
            n
        }
        Err(e) => {
            warn!("Row indexing failed: {}", e);
            0
        }
    }
}
