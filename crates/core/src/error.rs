//! Error types for graph construction and traversal
//!
//! Resolution gaps (unresolvable imports, unknown services) are not errors:
//! they are recorded on the graph and logged. Everything here either means
//! the build cannot start or that an internal invariant broke.

use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    /// A lookup referenced a key that was never registered
    #[error("{kind} not found: {key}")]
    NotFound { kind: &'static str, key: String },

    /// The project root or its manifest cannot be used
    #[error("configuration error in {}: {reason}", path.display())]
    Configuration { path: PathBuf, reason: String },

    /// An internal invariant was violated; any order produced would be unsound
    #[error("assertion failed: {0}")]
    Assertion(String),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("invalid glob pattern: {0}")]
    Glob(#[from] globset::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GraphError {
    pub(crate) fn not_found(kind: &'static str, key: impl Into<String>) -> Self {
        GraphError::NotFound {
            kind,
            key: key.into(),
        }
    }

    pub(crate) fn configuration(path: &Path, reason: impl Into<String>) -> Self {
        GraphError::Configuration {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        GraphError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, GraphError>;
