//! Error types for tablegen

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tablegen errors
#[derive(Error, Debug)]
pub enum Error {
    /// Data source unreachable, authentication failure, or unsupported driver.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The catalog has no column rows for the named table.
    #[error("Table not found: {0}")]
    TableNotFound(String),

    /// The caller-supplied deadline passed before introspection finished.
    #[error("Introspection of '{0}' exceeded its deadline")]
    Timeout(String),

    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Template syntax error in {template}: {message}")]
    TemplateSyntax { template: String, message: String },

    #[error("Render error in {template}: {message}")]
    Render { template: String, message: String },

    #[error("Generation record not found: {0}")]
    RecordNotFound(String),

    /// Rollback refused because files changed on disk since the record was taken.
    #[error("Rollback of {record} refused, files changed on disk: {}", display_paths(.paths))]
    Drift { record: String, paths: Vec<PathBuf> },

    #[error("Unknown feature: {0}")]
    UnknownFeature(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Journal {} is malformed: {source}", .path.display())]
    JournalCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// True for the one error kind a multi-table batch skips over.
    pub fn is_table_not_found(&self) -> bool {
        matches!(self, Error::TableNotFound(_))
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}
