// Per-table reconciliation: resolve key, match, diff, count, sample.
//
// Detail samples keep the first N rows encountered per category. That is a
// truncation, not a random sample; consumers must not read it as
// representative of the whole table.

use crate::model::{RowSnapshot, Table};
use crate::reconcile::differ::{Differ, FieldDiffs};
use crate::reconcile::key::{Key, KeyResolver};
use crate::reconcile::matcher::DestinationIndex;
use crate::reconcile::normalize::Normalizer;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::debug;

pub const DEFAULT_MAX_DETAILS: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub rows_in_source: usize,
    pub rows_in_destination: usize,
    pub matching: usize,
    pub different: usize,
    pub missing: usize,
    pub extra: usize,
    pub has_differences: bool,
    // `matching / rows_in_source` as a percentage, one decimal; 0 for an
    // empty source.
    pub match_percentage: f64,
}

impl TableSummary {
    pub fn from_counts(
        rows_in_source: usize,
        rows_in_destination: usize,
        matching: usize,
        different: usize,
        missing: usize,
        extra: usize,
    ) -> Self {
        Self {
            rows_in_source,
            rows_in_destination,
            matching,
            different,
            missing,
            extra,
            has_differences: different > 0 || missing > 0 || extra > 0,
            match_percentage: match_percentage(matching, rows_in_source),
        }
    }

    // Classification counts only, for comparing runs.
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        (self.matching, self.different, self.missing, self.extra)
    }
}

pub fn match_percentage(matching: usize, rows_in_source: usize) -> f64 {
    if rows_in_source == 0 {
        return 0.0;
    }
    (matching as f64 / rows_in_source as f64 * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DifferentRow {
    pub key: String,
    pub source_row: RowSnapshot,
    pub destination_row: RowSnapshot,
    pub differences: FieldDiffs,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDetails {
    pub matching: Vec<RowSnapshot>,
    pub different: Vec<DifferentRow>,
    pub missing: Vec<RowSnapshot>,
    pub extra: Vec<RowSnapshot>,
}

impl TableDetails {
    pub fn sample_count(&self) -> usize {
        self.matching.len() + self.different.len() + self.missing.len() + self.extra.len()
    }
}

#[derive(Debug, Clone)]
pub struct TableOptions {
    pub max_details_per_category: usize,
    // Source rows probed per segment; 0 means one pass.
    pub chunk_size: usize,
    pub key_resolver: KeyResolver,
    // Columns never compared (identity columns expected to diverge).
    pub ignored_fields: Vec<String>,
    pub normalizer: Normalizer,
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            max_details_per_category: DEFAULT_MAX_DETAILS,
            chunk_size: 0,
            key_resolver: KeyResolver::default(),
            ignored_fields: Vec::new(),
            normalizer: Normalizer::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableReconciliation {
    pub table: String,
    pub key: Option<Key>,
    pub summary: TableSummary,
    pub details: TableDetails,
    pub note: Option<String>,
    pub error: Option<String>,
    pub compare_ms: u128,
}

pub fn reconcile_table(
    source: &Table,
    destination: &Table,
    declared_key: Option<&[String]>,
    opts: &TableOptions,
) -> TableReconciliation {
    let start = Instant::now();
    let mut out = TableReconciliation {
        table: source.name.clone(),
        key: None,
        summary: TableSummary::from_counts(source.len(), destination.len(), 0, 0, 0, 0),
        details: TableDetails::default(),
        note: None,
        error: None,
        compare_ms: 0,
    };
    let warnings: Vec<&str> = source
        .warnings
        .iter()
        .chain(destination.warnings.iter())
        .map(String::as_str)
        .collect();
    if !warnings.is_empty() {
        out.note = Some(warnings.join("; "));
    }

    if source.is_empty() && destination.is_empty() {
        let empty = "table has no rows on either side";
        out.note = Some(match out.note.take() {
            Some(prior) => format!("{}; {}", prior, empty),
            None => empty.to_string(),
        });
        return out;
    }

    let key = match opts
        .key_resolver
        .resolve_with_declared(source, destination, declared_key)
    {
        Ok(k) => k,
        Err(e) => {
            out.error = Some(e.to_string());
            return out;
        }
    };
    debug!(
        "reconcile_table: {} key [{}] ({:?})",
        source.name,
        key.label(),
        key.origin
    );

    let cap = opts.max_details_per_category;
    let differ = Differ::new(opts.ignored_fields.clone(), opts.normalizer);
    let plan = differ.plan(&source.columns, &destination.columns);
    let mut index = DestinationIndex::build(&destination.rows, &key, opts.normalizer);
    let chunk_size = if opts.chunk_size == 0 {
        source.rows.len().max(1)
    } else {
        opts.chunk_size
    };

    let (mut matching, mut different, mut missing, mut extra) = (0usize, 0usize, 0usize, 0usize);
    for segment in source.rows.chunks(chunk_size) {
        let probe = index.probe(segment);
        for (src, dst) in probe.matched {
            let diffs = plan.diff(src, dst);
            if diffs.is_empty() {
                matching += 1;
                if out.details.matching.len() < cap {
                    out.details
                        .matching
                        .push(without_fields(src.snapshot(), &opts.ignored_fields));
                }
            } else {
                different += 1;
                if out.details.different.len() < cap {
                    out.details.different.push(DifferentRow {
                        key: display_key(src, &key),
                        source_row: src.snapshot(),
                        destination_row: dst.snapshot(),
                        differences: diffs,
                    });
                }
            }
        }
        for src in probe.source_only {
            missing += 1;
            if out.details.missing.len() < cap {
                out.details.missing.push(src.snapshot());
            }
        }
    }
    for dst in index.finish() {
        extra += 1;
        if out.details.extra.len() < cap {
            out.details.extra.push(dst.snapshot());
        }
    }

    out.summary = TableSummary::from_counts(
        source.len(),
        destination.len(),
        matching,
        different,
        missing,
        extra,
    );
    out.key = Some(key);
    out.compare_ms = start.elapsed().as_millis();
    out
}

fn display_key(row: &crate::model::Row, key: &Key) -> String {
    key.columns
        .iter()
        .map(|c| row.get(c).flatten().unwrap_or("NULL").trim().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn without_fields(mut snapshot: RowSnapshot, ignored: &[String]) -> RowSnapshot {
    snapshot.0.retain(|(c, _)| !ignored.contains(c));
    snapshot
}
