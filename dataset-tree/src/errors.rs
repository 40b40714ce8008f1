//! Error type of the dataset-tree crate.

use std::path::PathBuf;

use catalog_client::CatalogError;
use thiserror::Error;

/// Convenient alias for dataset-tree results.
pub type TreeResult<T> = Result<T, TreeError>;

#[derive(Debug, Error)]
pub enum TreeError {
    /// Catalog or service lookup failure that could not be degraded.
    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// An input file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An input file is not the JSON we expect.
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A line of the tab-separated run file could not be parsed.
    #[error("{path}:{line}: {reason}")]
    Twiki {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// A blacklist glob did not compile.
    #[error("invalid blacklist pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// Year configuration inconsistency.
    #[error("year configuration: {0}")]
    Config(String),
}

impl TreeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TreeError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        TreeError::Json {
            path: path.into(),
            source,
        }
    }
}
