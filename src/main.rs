// recondiff: reconcile two schemas extracted from SQL dumps, text files and
// Word documents, and write JSON/HTML reports.

use clap::{CommandFactory, Parser};
use recondiff::config::parse_key_override;
use recondiff::pipeline::{self, RunResult};
use recondiff::progress::ProgressManager;
use recondiff::{logger, CancelFlag, Config};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, warn};

// Command-line flags and positional arguments. Flags override the YAML config.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Enable debug logging (disables progress bars).
    #[arg(long)]
    debug: bool,

    /// YAML configuration file.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Schema treated as the source of truth.
    #[arg(long)]
    source_schema: Option<String>,

    /// Schema compared against the source.
    #[arg(long = "dest-schema")]
    destination_schema: Option<String>,

    /// Sample rows kept per category and table.
    #[arg(long)]
    max_details: Option<usize>,

    /// Tables reconciled per parallel wave.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Source rows per matching segment (0 = one pass).
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Reconcile tables one at a time.
    #[arg(long)]
    sequential: bool,

    /// Upper bound on worker threads.
    #[arg(long)]
    workers: Option<usize>,

    /// Write detail samples of large tables to disk.
    #[arg(long)]
    save_large_tables: bool,

    /// Source row count above which details are written to disk.
    #[arg(long)]
    large_table_threshold: Option<usize>,

    /// Directory for reports.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Explicit key as table=col1,col2 (repeatable).
    #[arg(long = "key")]
    keys: Vec<String>,

    /// Compare key values case-insensitively.
    #[arg(long)]
    case_insensitive_keys: bool,

    /// Apply Unicode NFKC normalization before comparing.
    #[arg(long)]
    unicode_nfkc: bool,

    /// Append one JSON document per extracted row to this file.
    #[arg(long)]
    index_out: Option<PathBuf>,

    /// Skip the HTML report.
    #[arg(long)]
    no_html: bool,

    /// Input files or directories (.sql, .txt, .docx).
    inputs: Vec<PathBuf>,
}

impl Args {
    fn into_config(self) -> recondiff::Result<Config> {
        let mut cfg = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(v) = self.source_schema {
            cfg.source_schema = v;
        }
        if let Some(v) = self.destination_schema {
            cfg.destination_schema = v;
        }
        if !self.inputs.is_empty() {
            cfg.inputs = self.inputs;
        }
        if let Some(v) = self.max_details {
            cfg.max_details_per_category = v;
        }
        if let Some(v) = self.batch_size {
            cfg.batch_size = v;
        }
        if let Some(v) = self.chunk_size {
            cfg.chunk_size = v;
        }
        if self.sequential {
            cfg.use_parallel = false;
        }
        if let Some(v) = self.workers {
            cfg.max_workers = v;
        }
        if self.save_large_tables {
            cfg.save_large_tables_to_disk = true;
        }
        if let Some(v) = self.large_table_threshold {
            cfg.large_table_threshold = v;
        }
        if let Some(v) = self.output_dir {
            cfg.output_dir = v;
        }
        for raw in &self.keys {
            let (table, columns) = parse_key_override(raw)?;
            cfg.keys.insert(table, columns);
        }
        if self.case_insensitive_keys {
            cfg.case_insensitive_keys = true;
        }
        if self.unicode_nfkc {
            cfg.unicode_normalization = true;
        }
        if let Some(v) = self.index_out {
            cfg.index_path = Some(v);
        }
        if self.no_html {
            cfg.write_html = false;
        }
        Ok(cfg)
    }
}

fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let wall_start = Instant::now();
    if std::env::args().len() == 1 {
        Args::command().print_help()?;
        eprintln!();
        std::process::exit(1);
    }
    let args = Args::parse();

    logger::init(args.debug);
    debug!("main: starting reconciliation");

    // Progress bars are disabled in debug mode to avoid mangled output.
    let progress = ProgressManager::new(!args.debug);
    let cancel = CancelFlag::new();
    // Ctrl-C stops new tables from starting; running ones finish.
    let handler = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler.cancel()) {
        warn!("Ctrl-C handler not installed: {}", e);
    }

    let outcome = args
        .into_config()
        .and_then(|cfg| pipeline::run(&cfg, &progress, &cancel));

    let sep = "=".repeat(60);
    {
        let mut stderr = io::stderr();
        writeln!(stderr, "\n{}\nSUMMARY\n{}", sep, sep)?;
        match &outcome {
            Ok(artifacts) => {
                let s = &artifacts.report.summary;
                writeln!(stderr, "Tables:       {}", s.total_tables)?;
                writeln!(stderr, "Source rows:  {}", s.total_rows_source)?;
                writeln!(stderr, "Dest rows:    {}", s.total_rows_destination)?;
                writeln!(stderr, "Matching:     {}", s.total_matching_rows)?;
                writeln!(stderr, "Different:    {}", s.total_different_rows)?;
                writeln!(stderr, "Missing:      {}", s.total_missing_rows)?;
                writeln!(stderr, "Extra:        {}", s.total_extra_rows)?;
                writeln!(stderr, "Errors:       {}", s.tables_with_errors)?;
                writeln!(stderr, "Match:        {:.1}%", s.match_percentage)?;
                for (table, err) in artifacts.report.table_errors() {
                    writeln!(stderr, "  {}: {}", table, err)?;
                }
            }
            Err(e) => writeln!(stderr, "Failed: {}", e)?,
        }
        writeln!(stderr, "{}", sep)?;
    }

    let result = RunResult::from_outcome(&outcome);
    println!("{}", serde_json::to_string_pretty(&result)?);
    debug!("Timing: total wall time {:?}", wall_start.elapsed());

    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
