use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Source directory for grade '{grade}' not found or unreadable: {}", path.display())]
    SourceNotFound { grade: String, path: PathBuf },

    #[error("No index built for grade '{0}'")]
    IndexNotFound(String),

    #[error("Embedding failed: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("Index storage failed: {0:#}")]
    Storage(#[source] anyhow::Error),

    #[error("Catalog at {} is unreadable: {reason}", path.display())]
    CorruptCatalog { path: PathBuf, reason: String },

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
