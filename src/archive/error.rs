use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("archive I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("key '{key}' is already present in the archive")]
    DuplicateKey { key: String },

    #[error("invalid record key '{key}': {details}")]
    InvalidKey { key: String, details: String },

    #[error("record '{key}' failed integrity check: {details}")]
    Integrity { key: String, details: String },

    #[error("no record with key '{key}'")]
    NotFound { key: String },

    #[error("malformed archive file '{}': {details}", path.display())]
    Format { path: PathBuf, details: String },

    #[error("failed to serialize record '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn integrity(key: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Integrity {
            key: key.into(),
            details: details.into(),
        }
    }

    pub fn format(path: impl Into<PathBuf>, details: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            details: details.into(),
        }
    }
}
