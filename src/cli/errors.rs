//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::fmt;
use std::io;

use crate::config::ConfigError;
use crate::versions::VersionError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Configuration file error
    ConfigError,
    /// I/O error (stdout, sockets)
    IoError,
    /// Runtime or server failed to start
    BootFailed,
    /// Container, path or version rejected before resolution
    InvalidArgument,
    /// Resolution finished with an error
    ResolveFailed,
    /// Interrupted by the operator
    Cancelled,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigError => "SNAPVIEW_CLI_CONFIG_ERROR",
            Self::IoError => "SNAPVIEW_CLI_IO_ERROR",
            Self::BootFailed => "SNAPVIEW_CLI_BOOT_FAILED",
            Self::InvalidArgument => "SNAPVIEW_CLI_INVALID_ARGUMENT",
            Self::ResolveFailed => "SNAPVIEW_CLI_RESOLVE_FAILED",
            Self::Cancelled => "SNAPVIEW_CLI_CANCELLED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Config error
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::ConfigError, msg)
    }

    /// I/O error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    /// Boot failed
    pub fn boot_failed(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::BootFailed, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::io_error(format!("JSON error: {}", e))
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::config_error(e.to_string())
    }
}

impl From<VersionError> for CliError {
    fn from(e: VersionError) -> Self {
        let code = match e {
            VersionError::InvalidAddress(_) => CliErrorCode::InvalidArgument,
            VersionError::Cancelled => CliErrorCode::Cancelled,
            _ => CliErrorCode::ResolveFailed,
        };
        Self::new(code, e.to_string())
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_code() {
        let err = CliError::config_error("storage.base_dir must not be empty");
        assert_eq!(
            err.to_string(),
            "SNAPVIEW_CLI_CONFIG_ERROR: storage.base_dir must not be empty"
        );
    }

    #[test]
    fn test_version_error_mapping() {
        let err = CliError::from(VersionError::InvalidAddress("empty path".into()));
        assert_eq!(err.code(), &CliErrorCode::InvalidArgument);

        let err = CliError::from(VersionError::Cancelled);
        assert_eq!(err.code_str(), "SNAPVIEW_CLI_CANCELLED");

        let err = CliError::from(VersionError::NotFound("b/k".into()));
        assert_eq!(err.code(), &CliErrorCode::ResolveFailed);
        assert!(err.message().contains("b/k"));
    }

    #[test]
    fn test_config_error_mapping() {
        let err = CliError::from(ConfigError::Invalid("bad".into()));
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }
}
