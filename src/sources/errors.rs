//! # Source Errors

use std::io;

use thiserror::Error;

/// Result type for source queries
pub type SourceResult<T> = Result<T, SourceError>;

/// Outcome of a failed query against a live or snapshot source
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SourceError {
    /// Nothing exists at the queried location
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transport, authentication or timeout failure
    #[error("Source unavailable: {0}")]
    Unavailable(String),
}

impl SourceError {
    /// Map an I/O error at `path` onto the two source outcomes
    pub fn from_io(path: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            SourceError::NotFound(path.to_string())
        } else {
            SourceError::Unavailable(format!("{}: {}", path, err))
        }
    }
}
