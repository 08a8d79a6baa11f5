// Extraction: turn SQL dumps, text files and Word documents into Rows plus
// any declared primary keys found next to them.

pub mod docx;
pub mod insert;
pub mod schema;

use crate::error::{ReconError, Result};
use crate::model::Row;
use crate::progress::ProgressManager;
use insert::{ColumnsMap, InsertParser, StatementSplitter};
use rayon::prelude::*;
use schema::SchemaParser;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

// Declared primary keys keyed by (schema, table).
pub type DeclaredKeys = BTreeMap<(String, String), Vec<String>>;

#[derive(Debug, Default)]
pub struct ExtractedFile {
    pub rows: Vec<Row>,
    pub declared_keys: DeclaredKeys,
}

// One input file and the schema its unqualified rows belong to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputFile {
    pub path: PathBuf,
    pub schema: String,
}

const EXTENSIONS: [&str; 3] = ["sql", "txt", "docx"];

// Label for unqualified rows: the file name up to its first dot.
pub fn schema_label(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.split('.').next())
        .filter(|s| !s.is_empty())
        .unwrap_or("default")
        .to_string()
}

// Extract rows from plain text. CREATE TABLE statements in the same text
// supply column lists and primary keys.
pub fn extract_text(text: &str, default_schema: &str) -> Result<ExtractedFile> {
    let statements = StatementSplitter::new()?.split(text);
    let mut columns_map = ColumnsMap::new();
    let mut declared_keys = DeclaredKeys::new();
    for def in SchemaParser::new()?.parse_statements(&statements) {
        let schema = def.schema.unwrap_or_else(|| default_schema.to_string());
        if !def.primary_key.is_empty() {
            declared_keys.insert((schema, def.table.clone()), def.primary_key);
        }
        if !def.columns.is_empty() {
            columns_map.insert(def.table.to_lowercase(), def.columns);
        }
    }
    let rows = InsertParser::new(&columns_map).parse_statements(&statements, default_schema);
    Ok(ExtractedFile {
        rows,
        declared_keys,
    })
}

pub fn extract_file(path: &Path, default_schema: &str) -> Result<ExtractedFile> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let text = match ext.as_str() {
        "sql" | "txt" => fs::read_to_string(path)?,
        "docx" => docx::read_docx_text(path)?,
        other => {
            return Err(ReconError::extraction(
                path,
                format!("unsupported file type '{}'", other),
            ))
        }
    };
    let extracted = extract_text(&text, default_schema)?;
    debug!(
        "Extracted {} rows from {}",
        extracted.rows.len(),
        path.display()
    );
    Ok(extracted)
}

// Expand inputs into files. Directories are walked recursively for
// supported extensions; files under a `schema_paths` directory take that
// schema as their label. Unreadable paths are logged and skipped.
pub fn collect_inputs(inputs: &[PathBuf], schema_paths: &BTreeMap<String, PathBuf>) -> Vec<InputFile> {
    let mut files = Vec::new();
    for input in inputs {
        walk(input, None, &mut files);
    }
    for (schema, dir) in schema_paths {
        walk(dir, Some(schema), &mut files);
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    files.dedup_by(|a, b| a.path == b.path);
    files
}

fn walk(path: &Path, schema: Option<&str>, out: &mut Vec<InputFile>) {
    if path.is_dir() {
        let mut entries: Vec<PathBuf> = match fs::read_dir(path) {
            Ok(rd) => rd.filter_map(|e| e.ok().map(|e| e.path())).collect(),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                return;
            }
        };
        entries.sort();
        for entry in entries {
            walk(&entry, schema, out);
        }
        return;
    }
    if !path.exists() {
        warn!("Skipping {}: no such file or directory", path.display());
        return;
    }
    let supported = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    if supported {
        out.push(InputFile {
            path: path.to_path_buf(),
            schema: schema.map(str::to_string).unwrap_or_else(|| schema_label(path)),
        });
    } else {
        debug!("skipping unsupported input {}", path.display());
    }
}

// Extract every file in parallel. A failing file is logged and skipped;
// no rows at all is an error.
pub fn extract_all(files: &[InputFile], progress: &ProgressManager) -> Result<ExtractedFile> {
    info!("Extracting rows from {} files", files.len());
    let bar = progress.new_file_bar(files.len() as u64);
    let results: Vec<Option<ExtractedFile>> = files
        .par_iter()
        .map(|f| {
            let out = match extract_file(&f.path, &f.schema) {
                Ok(x) => Some(x),
                Err(e) => {
                    warn!("Skipping {}: {}", f.path.display(), e);
                    None
                }
            };
            if let Some(b) = &bar {
                b.inc(1);
            }
            out
        })
        .collect();
    if let Some(b) = &bar {
        b.finish();
    }

    let mut merged = ExtractedFile::default();
    for mut file in results.into_iter().flatten() {
        merged.rows.append(&mut file.rows);
        merged.declared_keys.append(&mut file.declared_keys);
    }
    if merged.rows.is_empty() {
        return Err(ReconError::NoDataExtracted);
    }
    info!("Extracted {} rows", merged.rows.len());
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn label_is_stem_before_first_dot() {
        assert_eq!(schema_label(Path::new("/x/hr.backup.sql")), "hr");
        assert_eq!(schema_label(Path::new("payroll.docx")), "payroll");
    }

    #[test]
    fn create_table_supplies_columns_and_key() {
        let text = "CREATE TABLE users (id INT, name TEXT, PRIMARY KEY (id));\n\
                    INSERT INTO users VALUES (1, 'Ann');";
        let out = extract_text(text, "hr").unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].columns, vec!["id", "name"]);
        assert_eq!(
            out.declared_keys.get(&("hr".to_string(), "users".to_string())),
            Some(&vec!["id".to_string()])
        );
    }

    #[test]
    fn walks_directories_and_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hr.sql"), "INSERT INTO t (id) VALUES (1);").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::write(dir.path().join("broken.docx"), "not a zip").unwrap();

        let files = collect_inputs(&[dir.path().to_path_buf()], &BTreeMap::new());
        assert_eq!(files.len(), 2);
        let out = extract_all(&files, &ProgressManager::disabled()).unwrap();
        assert_eq!(out.rows.len(), 1);
        assert_eq!(out.rows[0].schema, "hr");
    }

    #[test]
    fn nothing_extracted_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("empty.sql"), "SELECT 1;").unwrap();
        let files = collect_inputs(&[dir.path().to_path_buf()], &BTreeMap::new());
        let err = extract_all(&files, &ProgressManager::disabled()).unwrap_err();
        assert!(matches!(err, ReconError::NoDataExtracted));
    }

    #[test]
    fn schema_paths_label_their_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("dump.sql"), "INSERT INTO t (id) VALUES (1);").unwrap();
        let mut paths = BTreeMap::new();
        paths.insert("legacy".to_string(), dir.path().to_path_buf());
        let files = collect_inputs(&[], &paths);
        assert_eq!(files[0].schema, "legacy");
    }

    #[test]
    fn prose_apostrophes_do_not_swallow_statements() {
        let text = "Here's the payroll data.\n\
                    INSERT INTO users (id, name) VALUES (1, 'Ann');\n\
                    INSERT INTO users (id, name) VALUES (2, 'Bob');";
        let out = extract_text(text, "hr").unwrap();
        assert_eq!(out.rows.len(), 2);
        assert!(out.rows.iter().all(|r| r.schema == "hr"));
    }

    #[test]
    fn missing_input_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hr.sql"), "INSERT INTO t (id) VALUES (1);").unwrap();
        let inputs = vec![dir.path().join("gone.docx"), dir.path().to_path_buf()];
        let files = collect_inputs(&inputs, &BTreeMap::new());
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].schema, "hr");
        let out = extract_all(&files, &ProgressManager::disabled()).unwrap();
        assert_eq!(out.rows.len(), 1);
    }
}
