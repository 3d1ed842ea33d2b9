//! Error types and load result structures for the ruleset loader.

use std::path::PathBuf;

/// Errors that can occur while reading or writing ruleset files.
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Unsupported file or unknown ruleset.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filesystem watcher error.
    #[error("Notify watcher error: {0}")]
    Notify(#[from] notify::Error),
}

pub type Result<T> = std::result::Result<T, LoaderError>;

/// Outcome of loading a single ruleset file.
#[derive(Debug)]
pub struct LoadResult {
    pub path: PathBuf,
    pub status: LoadStatus,
}

#[derive(Debug)]
pub enum LoadStatus {
    /// File parsed; `rules` raw entries await deployment.
    Loaded { ruleset: String, rules: usize },
    /// File was skipped (dotfile, unsupported extension).
    Skipped { reason: String },
    /// File could not be read or parsed.
    Failed { error: String },
}
