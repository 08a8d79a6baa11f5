// Error type shared by the library and the binary.
// Data-shape problems inside one table never become errors here; they are
// recorded on the table report instead so the run can continue.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconError {
    #[error("no usable key column for table {table}")]
    NoKeyAvailable { table: String },

    #[error("no common tables found between {source_schema} and {destination_schema}")]
    NoCommonTables {
        source_schema: String,
        destination_schema: String,
    },

    #[error("schema not present: {0}")]
    SchemaNotFound(String),

    #[error("no rows could be extracted from any input")]
    NoDataExtracted,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to extract {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

pub type Result<T> = std::result::Result<T, ReconError>;

impl ReconError {
    pub fn extraction(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ReconError::Extraction {
            path: path.into(),
            message: message.into(),
        }
    }

    // Errors that end the whole run rather than a single table.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReconError::NoCommonTables { .. }
                | ReconError::SchemaNotFound(_)
                | ReconError::NoDataExtracted
                | ReconError::Config(_)
        )
    }
}
