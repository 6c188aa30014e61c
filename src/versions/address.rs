//! Logical object addresses
//!
//! An address names one object independently of the source that serves it.
//! Validation happens once, at construction, so no traversal segment can ever
//! reach a remote path.

use std::fmt;

use serde::Serialize;

use super::errors::{VersionError, VersionResult};

/// Container plus slash-separated path within the container
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectAddress {
    container: String,
    path: String,
}

impl ObjectAddress {
    /// Validate and build an address
    ///
    /// Rejects empty components, a container containing `/`, NUL bytes,
    /// and any path segment that is empty, `.` or `..`.
    pub fn new(container: impl Into<String>, path: impl Into<String>) -> VersionResult<Self> {
        let container = container.into();
        let path = path.into();

        check_container(&container)?;
        if path.is_empty() {
            return Err(VersionError::InvalidAddress("empty path".into()));
        }
        if path.contains('\0') {
            return Err(VersionError::InvalidAddress("NUL byte in address".into()));
        }
        for segment in path.split('/') {
            if segment.is_empty() || is_dot_segment(segment) {
                return Err(VersionError::InvalidAddress(format!(
                    "invalid path segment in {}",
                    path
                )));
            }
        }

        Ok(Self { container, path })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Final path segment
    pub fn file_name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

impl fmt::Display for ObjectAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.path)
    }
}

/// Container plus a key prefix, for one level of a listing
///
/// The prefix may be empty, end in `/` (a folder) or end in a partial
/// name. Every complete segment obeys the same rules as an object path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ObjectPrefix {
    container: String,
    prefix: String,
}

impl ObjectPrefix {
    pub fn new(container: impl Into<String>, prefix: impl Into<String>) -> VersionResult<Self> {
        let container = container.into();
        let prefix = prefix.into();

        check_container(&container)?;
        if prefix.contains('\0') {
            return Err(VersionError::InvalidAddress("NUL byte in prefix".into()));
        }
        if let Some((folders, _)) = prefix.rsplit_once('/') {
            for segment in folders.split('/') {
                if segment.is_empty() || is_dot_segment(segment) {
                    return Err(VersionError::InvalidAddress(format!(
                        "invalid prefix segment in {}",
                        prefix
                    )));
                }
            }
        }

        Ok(Self { container, prefix })
    }

    pub fn container(&self) -> &str {
        &self.container
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Complete folder segments of the prefix, without the trailing `/`
    pub fn folder(&self) -> &str {
        self.prefix.rsplit_once('/').map(|(f, _)| f).unwrap_or("")
    }

    /// Partial name after the last `/` that entries must start with
    pub fn name_start(&self) -> &str {
        self.prefix
            .rsplit_once('/')
            .map(|(_, n)| n)
            .unwrap_or(&self.prefix)
    }

    /// Key of the entry `name` inside `folder()`
    pub fn child_key(&self, name: &str) -> String {
        match self.folder() {
            "" => name.to_string(),
            folder => format!("{}/{}", folder, name),
        }
    }
}

fn check_container(container: &str) -> VersionResult<()> {
    if container.is_empty() {
        return Err(VersionError::InvalidAddress("empty container".into()));
    }
    if container.contains('\0') || container.contains('/') || is_dot_segment(container) {
        return Err(VersionError::InvalidAddress(format!(
            "invalid container: {}",
            container
        )));
    }
    Ok(())
}

fn is_dot_segment(segment: &str) -> bool {
    segment == "." || segment == ".."
}
