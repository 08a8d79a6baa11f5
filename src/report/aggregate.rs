// Report aggregation: reconcile every common table, in waves of `batch_size`
// tables spread over a rayon pool, then fold the per-table results into the
// report on the calling thread.
//
// Workers never touch shared state. Each returns its own TableReport and the
// merge happens after the wave, in table-name order, so sequential and
// parallel runs produce the same report apart from timing.

use crate::config::Config;
use crate::error::{ReconError, Result};
use crate::logger;
use crate::model::{Schema, Table};
use crate::progress::ProgressManager;
use crate::reconcile::{reconcile_table, TableDetails, TableOptions};
use crate::report::{
    spill_dir, OverallSummary, Report, ReportMeta, SchemaOnlyTables, TableReport,
};
use chrono::{Local, Utc};
use rayon::prelude::*;
use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

// One side of a comparison as seen by the aggregator. Loading a table is the
// only place a per-table I/O failure can appear.
pub trait TableSource: Sync {
    fn schema_name(&self) -> &str;
    fn table_names(&self) -> BTreeSet<String>;
    fn load_table(&self, name: &str) -> Result<Cow<'_, Table>>;
    fn declared_key(&self, name: &str) -> Option<&[String]>;
}

impl TableSource for Schema {
    fn schema_name(&self) -> &str {
        &self.name
    }

    fn table_names(&self) -> BTreeSet<String> {
        self.tables.keys().cloned().collect()
    }

    fn load_table(&self, name: &str) -> Result<Cow<'_, Table>> {
        self.tables.get(name).map(Cow::Borrowed).ok_or_else(|| {
            ReconError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("table {} not loaded for schema {}", name, self.name),
            ))
        })
    }

    fn declared_key(&self, name: &str) -> Option<&[String]> {
        self.declared_keys.get(name).map(Vec::as_slice)
    }
}

// Cooperative cancellation, checked before each table starts. Clones share
// one flag, so a signal handler can hold a clone.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub struct AggregateOptions {
    pub table: TableOptions,
    pub batch_size: usize,
    pub use_parallel: bool,
    pub max_workers: usize,
    pub use_declared_keys: bool,
    pub save_large_tables_to_disk: bool,
    pub large_table_threshold: usize,
    // Root for spilled details; files go under `<output_dir>/temp/<report_id>`.
    pub output_dir: PathBuf,
    // Fixed report id; a local timestamp is used when empty.
    pub report_id: Option<String>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for AggregateOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            table: cfg.table_options(),
            batch_size: cfg.batch_size.max(1),
            use_parallel: cfg.use_parallel,
            max_workers: cfg.max_workers.max(1),
            use_declared_keys: cfg.use_declared_keys,
            save_large_tables_to_disk: cfg.save_large_tables_to_disk,
            large_table_threshold: cfg.large_table_threshold,
            output_dir: cfg.output_dir.clone(),
            report_id: None,
        }
    }
}

// Per-table timing data for profiling hot tables.
#[derive(Debug, Clone)]
struct TableTiming {
    table: String,
    load_ms: u128,
    compare_ms: u128,
}

impl TableTiming {
    fn total_ms(&self) -> u128 {
        self.load_ms + self.compare_ms
    }
}

pub struct ReportAggregator {
    opts: AggregateOptions,
    progress: ProgressManager,
    cancel: CancelFlag,
}

impl ReportAggregator {
    pub fn new(opts: AggregateOptions) -> Self {
        Self {
            opts,
            progress: ProgressManager::disabled(),
            cancel: CancelFlag::new(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressManager) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &AggregateOptions {
        &self.opts
    }

    pub fn aggregate(&self, source: &dyn TableSource, destination: &dyn TableSource) -> Result<Report> {
        let source_tables = source.table_names();
        let destination_tables = destination.table_names();
        let common: Vec<String> = source_tables
            .intersection(&destination_tables)
            .cloned()
            .collect();
        let schema_only = SchemaOnlyTables {
            source_only: source_tables.difference(&destination_tables).cloned().collect(),
            destination_only: destination_tables.difference(&source_tables).cloned().collect(),
        };
        info!(
            "aggregate: {} common tables, {} only in {}, {} only in {}",
            common.len(),
            schema_only.source_only.len(),
            source.schema_name(),
            schema_only.destination_only.len(),
            destination.schema_name()
        );
        if common.is_empty() {
            return Err(ReconError::NoCommonTables {
                source_schema: source.schema_name().to_string(),
                destination_schema: destination.schema_name().to_string(),
            });
        }

        let report_id = self
            .opts
            .report_id
            .clone()
            .unwrap_or_else(|| Local::now().format("%Y%m%d_%H%M%S").to_string());
        let spill_to = spill_dir(&self.opts.output_dir, &report_id);

        let (tables, timings, cancelled) = self.reconcile_all(&common, source, destination, &spill_to)?;

        let mut summary = OverallSummary::default();
        for table in tables.values() {
            summary.merge(table);
        }

        if logger::is_debug() {
            let mut rows = timings;
            rows.sort_by(|a, b| b.total_ms().cmp(&a.total_ms()));
            debug!("Timing: top 10 slowest tables (ms):");
            for t in rows.iter().take(10) {
                debug!(
                    "  {} total={} load={} compare={}",
                    t.table,
                    t.total_ms(),
                    t.load_ms,
                    t.compare_ms
                );
            }
        }

        Ok(Report {
            meta: ReportMeta {
                report_id,
                source_schema: source.schema_name().to_string(),
                destination_schema: destination.schema_name().to_string(),
                timestamp: Utc::now(),
                table_count: common.len(),
                cancelled,
            },
            tables,
            summary,
            schema_only_tables: schema_only,
        })
    }

    fn reconcile_all(
        &self,
        common: &[String],
        source: &dyn TableSource,
        destination: &dyn TableSource,
        spill_to: &Path,
    ) -> Result<(BTreeMap<String, TableReport>, Vec<TableTiming>, bool)> {
        let worker_count = common
            .len()
            .min(num_cpus::get())
            .min(self.opts.max_workers)
            .max(1);
        let parallel = self.opts.use_parallel && worker_count > 1;
        let pool = if parallel {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(worker_count)
                    .build()?,
            )
        } else {
            None
        };
        info!(
            "aggregate: {} tables in batches of {} ({})",
            common.len(),
            self.opts.batch_size,
            if parallel {
                format!("{} workers", worker_count)
            } else {
                "sequential".to_string()
            }
        );

        let bar = self.progress.new_table_bar(common.len() as u64);
        let mut tables = BTreeMap::new();
        let mut timings = Vec::with_capacity(common.len());
        let mut cancelled = false;
        let waves = common.len().div_ceil(self.opts.batch_size);

        for (wave, batch) in common.chunks(self.opts.batch_size).enumerate() {
            debug!("aggregate: batch {}/{}: {:?}", wave + 1, waves, batch);
            let run = |name: &String| {
                let out = self.run_table(name, source, destination, spill_to);
                if let Some(b) = &bar {
                    b.inc(1);
                }
                out
            };
            let results: Vec<Option<(TableReport, TableTiming)>> = match &pool {
                Some(pool) => pool.install(|| batch.par_iter().map(run).collect()),
                None => batch.iter().map(run).collect(),
            };

            for result in results {
                match result {
                    Some((report, timing)) => {
                        timings.push(timing);
                        tables.insert(report.table.clone(), report);
                    }
                    None => cancelled = true,
                }
            }
            if cancelled || self.cancel.is_cancelled() {
                cancelled = tables.len() < common.len();
                if cancelled {
                    warn!(
                        "aggregate: cancelled after {} of {} tables",
                        tables.len(),
                        common.len()
                    );
                }
                break;
            }
        }

        if let Some(b) = &bar {
            b.finish();
        }
        Ok((tables, timings, cancelled))
    }

    fn run_table(
        &self,
        name: &str,
        source: &dyn TableSource,
        destination: &dyn TableSource,
        spill_to: &Path,
    ) -> Option<(TableReport, TableTiming)> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let load_start = Instant::now();
        let loaded = source
            .load_table(name)
            .and_then(|s| destination.load_table(name).map(|d| (s, d)));
        let load_ms = load_start.elapsed().as_millis();
        let (src, dst) = match loaded {
            Ok(pair) => pair,
            Err(e) => {
                warn!("Table {} load error: {}", name, e);
                let timing = TableTiming {
                    table: name.to_string(),
                    load_ms,
                    compare_ms: 0,
                };
                return Some((TableReport::failed(name, e.to_string()), timing));
            }
        };

        let declared = if self.opts.use_declared_keys {
            destination
                .declared_key(name)
                .or_else(|| source.declared_key(name))
        } else {
            None
        };
        let result = reconcile_table(&src, &dst, declared, &self.opts.table);
        if let Some(err) = &result.error {
            warn!("Table {} compare error: {}", name, err);
        }
        info!(
            "Table {} compared: {} matching, {} different, {} missing, {} extra",
            name,
            result.summary.matching,
            result.summary.different,
            result.summary.missing,
            result.summary.extra
        );

        let mut report = TableReport {
            table: name.to_string(),
            key: result.key,
            summary: result.summary,
            details: Some(result.details),
            details_path: None,
            note: result.note,
            error: result.error,
        };
        if self.opts.save_large_tables_to_disk
            && report.summary.rows_in_source > self.opts.large_table_threshold
        {
            if let Some(details) = report.details.take() {
                match spill_details(spill_to, name, &details) {
                    Ok(path) => {
                        info!(
                            "Table {} details saved to disk ({} source rows)",
                            name, report.summary.rows_in_source
                        );
                        report.details_path = Some(path);
                    }
                    Err(e) => {
                        warn!("Table {} details kept in memory: {}", name, e);
                        report.details = Some(details);
                    }
                }
            }
        }

        let timing = TableTiming {
            table: name.to_string(),
            load_ms,
            compare_ms: result.compare_ms,
        };
        Some((report, timing))
    }
}

fn spill_details(dir: &Path, table: &str, details: &TableDetails) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_comparison.json", sanitize_filename(table)));
    fs::write(&path, serde_json::to_vec(details)?)?;
    Ok(path)
}

// Sanitize table name for filenames and append a short hash to avoid collisions.
fn sanitize_filename(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        out.push_str("table");
    }
    let sum = blake3::hash(name.as_bytes());
    format!("{}_{}", out, hex::encode(&sum.as_bytes()[..4]))
}
