// Report document produced by a reconciliation run.
//
// A `Report` carries everything a renderer needs: per-table summaries with
// precomputed match percentages, sampled details (inline or spilled to disk),
// the cross-table summary and the tables present on one side only.

pub mod aggregate;
pub mod html;

use crate::error::Result;
use crate::reconcile::{match_percentage, Key, TableDetails, TableSummary};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub use aggregate::{CancelFlag, ReportAggregator, TableSource};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportMeta {
    pub report_id: String,
    pub source_schema: String,
    pub destination_schema: String,
    pub timestamp: DateTime<Utc>,
    // Number of common tables compared.
    pub table_count: usize,
    // Set when the run stopped before every common table was reconciled.
    #[serde(default)]
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub key: Option<Key>,
    pub summary: TableSummary,
    // Inline samples; `None` when they were spilled to `details_path`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<TableDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TableReport {
    pub fn failed(table: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            key: None,
            summary: TableSummary::default(),
            details: Some(TableDetails::default()),
            details_path: None,
            note: None,
            error: Some(error.into()),
        }
    }

    // Detail samples, read back from disk when they were spilled.
    pub fn load_details(&self) -> Result<TableDetails> {
        if let Some(details) = &self.details {
            return Ok(details.clone());
        }
        match &self.details_path {
            Some(path) => {
                let text = fs::read_to_string(path)?;
                Ok(serde_json::from_str(&text)?)
            }
            None => Ok(TableDetails::default()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub total_tables: usize,
    pub total_rows_source: usize,
    pub total_rows_destination: usize,
    pub total_matching_rows: usize,
    pub total_different_rows: usize,
    pub total_missing_rows: usize,
    pub total_extra_rows: usize,
    pub tables_with_errors: usize,
    pub match_percentage: f64,
    pub all_matched: bool,
}

impl Default for OverallSummary {
    fn default() -> Self {
        Self {
            total_tables: 0,
            total_rows_source: 0,
            total_rows_destination: 0,
            total_matching_rows: 0,
            total_different_rows: 0,
            total_missing_rows: 0,
            total_extra_rows: 0,
            tables_with_errors: 0,
            match_percentage: 0.0,
            all_matched: true,
        }
    }
}

impl OverallSummary {
    pub fn merge(&mut self, table: &TableReport) {
        let s = &table.summary;
        self.total_tables += 1;
        self.total_rows_source += s.rows_in_source;
        self.total_rows_destination += s.rows_in_destination;
        self.total_matching_rows += s.matching;
        self.total_different_rows += s.different;
        self.total_missing_rows += s.missing;
        self.total_extra_rows += s.extra;
        if table.error.is_some() {
            self.tables_with_errors += 1;
        }
        if s.has_differences {
            self.all_matched = false;
        }
        self.match_percentage = match_percentage(self.total_matching_rows, self.total_rows_source);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaOnlyTables {
    pub source_only: BTreeSet<String>,
    pub destination_only: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub meta: ReportMeta,
    pub tables: BTreeMap<String, TableReport>,
    pub summary: OverallSummary,
    pub schema_only_tables: SchemaOnlyTables,
}

impl Report {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), json)?;
        Ok(())
    }

    pub fn table_errors(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tables
            .values()
            .filter_map(|t| t.error.as_deref().map(|e| (t.table.as_str(), e)))
    }
}

// Where a persisted report landed. A report that could not be written has
// no path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPaths {
    pub json: Option<PathBuf>,
    pub html: Option<PathBuf>,
}

// Persist the report as JSON and, optionally, HTML under `output_dir`.
// Every failure is logged and leaves the matching path empty; the report
// itself stays with the caller.
pub fn write_reports(report: &Report, output_dir: &Path, with_html: bool) -> ReportPaths {
    let mut paths = ReportPaths::default();
    if let Err(e) = fs::create_dir_all(output_dir) {
        warn!("Reports not written to {}: {}", output_dir.display(), e);
        return paths;
    }
    let stem = format!("validation_report_{}", report.meta.report_id);

    let json = output_dir.join(format!("{}.json", stem));
    match report.save_json(&json) {
        Ok(()) => {
            info!("JSON report saved to {}", json.display());
            paths.json = Some(json);
        }
        Err(e) => warn!("JSON report not written: {}", e),
    }

    if with_html {
        let path = output_dir.join(format!("{}.html", stem));
        match html::render(report).and_then(|doc| fs::write(&path, doc).map_err(Into::into)) {
            Ok(()) => {
                info!("HTML report saved to {}", path.display());
                paths.html = Some(path);
            }
            Err(e) => warn!("HTML report not written: {}", e),
        }
    }
    paths
}

pub fn spill_dir(output_dir: &Path, report_id: &str) -> PathBuf {
    output_dir.join("temp").join(report_id)
}

// Remove the spilled details of one report, or all of them.
pub fn cleanup_spill(output_dir: &Path, report_id: Option<&str>) -> Result<()> {
    let dir = match report_id {
        Some(id) => spill_dir(output_dir, id),
        None => output_dir.join("temp"),
    };
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
        info!("removed temporary files in {}", dir.display());
    }
    Ok(())
}
