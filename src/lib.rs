// Row-level reconciliation of two schemas extracted from SQL dumps, text
// files or Word documents.
//
// Rows are grouped into tables, matched by a resolved key, compared field by
// field and rolled up into a `report::Report` with per-table summaries and
// sampled details.

pub mod assembler;
pub mod config;
pub mod error;
pub mod index;
pub mod logger;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod progress;
pub mod reconcile;
pub mod report;

pub use assembler::{assemble, assemble_schemas, ColumnPolicy};
pub use config::Config;
pub use error::{ReconError, Result};
pub use model::{Row, RowSnapshot, Schema, SchemaSet, Table};
pub use pipeline::{run, RunArtifacts, RunResult};
pub use reconcile::{reconcile_table, Key, KeyOrigin, KeyResolver, TableOptions, TableSummary};
pub use report::aggregate::AggregateOptions;
pub use report::{CancelFlag, Report, ReportAggregator, TableReport, TableSource};
