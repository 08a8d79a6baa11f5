// Run configuration: loaded from YAML, then overridden by CLI flags.

use crate::assembler::ColumnPolicy;
use crate::error::{ReconError, Result};
use crate::reconcile::{KeyResolver, Normalizer, TableOptions};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_schema: String,
    pub destination_schema: String,

    // Files or directories to extract rows from.
    pub inputs: Vec<PathBuf>,
    // Directories whose rows are always labeled with the given schema.
    pub schema_paths: BTreeMap<String, PathBuf>,
    pub column_policy: ColumnPolicy,

    pub max_details_per_category: usize,
    // Tables per parallel wave.
    pub batch_size: usize,
    // Source rows per matching segment; 0 disables chunking.
    pub chunk_size: usize,
    pub use_parallel: bool,
    pub max_workers: usize,
    pub save_large_tables_to_disk: bool,
    pub large_table_threshold: usize,

    pub output_dir: PathBuf,
    pub write_html: bool,
    // JSONL file receiving one document per extracted row.
    pub index_path: Option<PathBuf>,

    // Explicit join key per table.
    pub keys: BTreeMap<String, Vec<String>>,
    pub use_declared_keys: bool,
    // `_id` columns the key heuristic skips.
    pub key_exclusions: Vec<String>,
    // Columns left out of row comparison.
    pub ignored_fields: Vec<String>,
    pub case_insensitive_keys: bool,
    pub unicode_normalization: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_schema: String::new(),
            destination_schema: String::new(),
            inputs: Vec::new(),
            schema_paths: BTreeMap::new(),
            column_policy: ColumnPolicy::Union,
            max_details_per_category: 100,
            batch_size: 3,
            chunk_size: 1000,
            use_parallel: true,
            max_workers: 4,
            save_large_tables_to_disk: false,
            large_table_threshold: 10_000,
            output_dir: PathBuf::from("validation_reports"),
            write_html: true,
            index_path: None,
            keys: BTreeMap::new(),
            use_declared_keys: true,
            key_exclusions: vec![
                "employee_id".to_string(),
                "contractor_id".to_string(),
                "department_id".to_string(),
            ],
            ignored_fields: vec!["employee_id".to_string(), "contractor_id".to_string()],
            case_insensitive_keys: false,
            unicode_normalization: false,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_schema.trim().is_empty() {
            return Err(ReconError::Config("source_schema is required".into()));
        }
        if self.destination_schema.trim().is_empty() {
            return Err(ReconError::Config("destination_schema is required".into()));
        }
        if self.batch_size == 0 {
            return Err(ReconError::Config("batch_size must be at least 1".into()));
        }
        if self.max_workers == 0 {
            return Err(ReconError::Config("max_workers must be at least 1".into()));
        }
        Ok(())
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.case_insensitive_keys, self.unicode_normalization)
    }

    pub fn table_options(&self) -> TableOptions {
        TableOptions {
            max_details_per_category: self.max_details_per_category,
            chunk_size: self.chunk_size,
            key_resolver: KeyResolver::new(self.key_exclusions.clone())
                .with_overrides(self.keys.clone()),
            ignored_fields: self.ignored_fields.clone(),
            normalizer: self.normalizer(),
        }
    }
}

// Parse a `table=col1,col2` key override.
pub fn parse_key_override(raw: &str) -> Result<(String, Vec<String>)> {
    let (table, cols) = raw
        .split_once('=')
        .ok_or_else(|| ReconError::Config(format!("key override '{}' is not table=columns", raw)))?;
    let columns: Vec<String> = cols
        .split(',')
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
        .collect();
    if table.trim().is_empty() || columns.is_empty() {
        return Err(ReconError::Config(format!("key override '{}' is empty", raw)));
    }
    Ok((table.trim().to_string(), columns))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yaml_fills_defaults() {
        let cfg = Config::from_yaml(
            "source_schema: hr\ndestination_schema: payroll\nchunk_size: 50\nkeys:\n  users: [id]\n",
        )
        .unwrap();
        assert_eq!(cfg.source_schema, "hr");
        assert_eq!(cfg.chunk_size, 50);
        assert_eq!(cfg.batch_size, 3);
        assert_eq!(cfg.max_details_per_category, 100);
        assert_eq!(cfg.keys["users"], vec!["id"]);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_missing_schemas() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("source_schema"));
    }

    #[test]
    fn key_override_parsing() {
        let (t, cols) = parse_key_override("orders=region, order_no").unwrap();
        assert_eq!(t, "orders");
        assert_eq!(cols, vec!["region", "order_no"]);
        assert!(parse_key_override("orders").is_err());
        assert!(parse_key_override("orders=").is_err());
    }
}
