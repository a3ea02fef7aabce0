use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("{what} not found: {}", path.display())]
    MissingInput { what: &'static str, path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{} must hold a JSON array of objects", path.display())]
    NotAnArray { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("dataset for table {0:?} has no columns")]
    EmptyDataset(String),

    #[error("cannot build SQL snapshot: {0}")]
    Snapshot(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, EvalError>;
