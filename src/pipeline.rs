// End-to-end run: extract -> assemble -> aggregate -> persist -> index.

use crate::assembler::assemble_schemas;
use crate::config::Config;
use crate::error::{ReconError, Result};
use crate::index::{index_rows, JsonlRowIndex};
use crate::model::SchemaSet;
use crate::parser::{self, DeclaredKeys};
use crate::progress::ProgressManager;
use crate::report::aggregate::AggregateOptions;
use crate::report::{write_reports, CancelFlag, Report, ReportAggregator, ReportPaths};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{error, info};

#[derive(Debug)]
pub struct RunArtifacts {
    pub report: Report,
    pub paths: ReportPaths,
    pub indexed_rows: Option<usize>,
}

// Machine-readable outcome of a run, printed by the binary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub json_report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_report: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunResult {
    pub fn from_outcome(outcome: &Result<RunArtifacts>) -> Self {
        match outcome {
            Ok(a) => Self {
                success: true,
                report_id: Some(a.report.meta.report_id.clone()),
                json_report: a.paths.json.clone(),
                html_report: a.paths.html.clone(),
                error: None,
            },
            Err(e) => Self {
                success: false,
                report_id: None,
                json_report: None,
                html_report: None,
                error: Some(e.to_string()),
            },
        }
    }
}

pub fn run(cfg: &Config, progress: &ProgressManager, cancel: &CancelFlag) -> Result<RunArtifacts> {
    cfg.validate()?;
    let start = Instant::now();

    let files = parser::collect_inputs(&cfg.inputs, &cfg.schema_paths);
    let extracted = parser::extract_all(&files, progress)?;
    let mut set = assemble_schemas(extracted.rows, cfg.column_policy);
    attach_declared_keys(&mut set, extracted.declared_keys);
    info!(
        "Assembled schemas: {}",
        set.names().join(", ")
    );

    let report = reconcile_schemas(cfg, &set, progress, cancel)?;
    let paths = write_reports(&report, &cfg.output_dir, cfg.write_html);

    let indexed_rows = cfg
        .index_path
        .as_ref()
        .map(|path| index_rows(&set, &JsonlRowIndex::new(path)));

    info!("Run finished in {} ms", start.elapsed().as_millis());
    Ok(RunArtifacts {
        report,
        paths,
        indexed_rows,
    })
}

// Reconcile the configured source and destination schemas of an already
// assembled set.
pub fn reconcile_schemas(
    cfg: &Config,
    set: &SchemaSet,
    progress: &ProgressManager,
    cancel: &CancelFlag,
) -> Result<Report> {
    let source = set
        .get(&cfg.source_schema)
        .ok_or_else(|| ReconError::SchemaNotFound(cfg.source_schema.clone()))?;
    let destination = set
        .get(&cfg.destination_schema)
        .ok_or_else(|| ReconError::SchemaNotFound(cfg.destination_schema.clone()))?;

    let result = ReportAggregator::new(AggregateOptions::from(cfg))
        .with_progress(progress.clone())
        .with_cancel(cancel.clone())
        .aggregate(source, destination);
    if let Err(e) = &result {
        if e.is_fatal() {
            error!("Reconciliation aborted: {}", e);
        }
    }
    result
}

// Declared keys only attach to schemas that produced rows.
fn attach_declared_keys(set: &mut SchemaSet, keys: DeclaredKeys) {
    for ((schema, table), columns) in keys {
        if let Some(s) = set.schemas.get_mut(&schema) {
            s.declared_keys.insert(table, columns);
        }
    }
}
