//! # Version Resolution Errors

use thiserror::Error;

use crate::sources::SourceError;

/// Result type for version resolution
pub type VersionResult<T> = Result<T, VersionError>;

/// Typed outcomes surfaced to the presentation layer
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VersionError {
    /// Object or version absent at the queried location
    #[error("Not found: {0}")]
    NotFound(String),

    /// Address rejected before any remote call
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Neither "current" nor a presently valid snapshot
    #[error("Unknown version: {0}")]
    UnknownVersion(String),

    /// A remote query failed for a reason other than absence
    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    /// The caller abandoned the operation
    #[error("Operation cancelled")]
    Cancelled,
}

impl VersionError {
    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            VersionError::NotFound(_) => 404,
            VersionError::InvalidAddress(_) => 400,
            VersionError::UnknownVersion(_) => 404,
            VersionError::SourceUnavailable(_) => 503,
            VersionError::Cancelled => 499,
        }
    }
}

impl From<SourceError> for VersionError {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::NotFound(what) => VersionError::NotFound(what),
            SourceError::Unavailable(why) => VersionError::SourceUnavailable(why),
        }
    }
}
