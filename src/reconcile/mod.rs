// Reconciliation engine: key resolution, row matching, row diffing and the
// per-table orchestration that ties them together.

pub mod differ;
pub mod key;
pub mod matcher;
pub mod normalize;
pub mod table;

pub use differ::{DiffPlan, Differ, FieldDiff, FieldDiffs, RowOutcome};
pub use key::{Key, KeyOrigin, KeyResolver};
pub use matcher::{match_rows, ChunkMatch, DestinationIndex, MatchResult};
pub use normalize::Normalizer;
pub use table::{
    match_percentage, reconcile_table, DifferentRow, TableDetails, TableOptions,
    TableReconciliation, TableSummary,
};
