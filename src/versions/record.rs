//! Version identities and records

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::address::ObjectAddress;
use super::errors::{VersionError, VersionResult};
use crate::sources::ObjectMeta;

/// Sentinel id of the live version
pub const CURRENT_VERSION: &str = "current";

/// Identifies one version of an object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionId {
    /// The live object
    Current,
    /// The copy inside the named snapshot
    Snapshot(String),
}

impl VersionId {
    /// Parse a caller-supplied id
    ///
    /// Only the shape is checked here; whether a snapshot id names a valid
    /// snapshot is decided against a fresh catalog at resolution time.
    pub fn parse(id: &str) -> VersionResult<Self> {
        if id == CURRENT_VERSION {
            return Ok(VersionId::Current);
        }
        if id.is_empty() || id == "." || id == ".." || id.contains('/') || id.contains('\0') {
            return Err(VersionError::UnknownVersion(id.to_string()));
        }
        Ok(VersionId::Snapshot(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            VersionId::Current => CURRENT_VERSION,
            VersionId::Snapshot(id) => id,
        }
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VersionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Which source a version was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionOrigin {
    Live,
    Snapshot,
}

/// One entry of an object's version history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionRecord {
    pub version_id: VersionId,
    pub origin: VersionOrigin,
    pub size: u64,
    pub modified: DateTime<Utc>,
    pub is_current: bool,
}

impl VersionRecord {
    /// Record for the live object
    pub fn live(meta: ObjectMeta) -> Self {
        Self {
            version_id: VersionId::Current,
            origin: VersionOrigin::Live,
            size: meta.size,
            modified: meta.modified,
            is_current: true,
        }
    }

    /// Record for the copy inside `snapshot_id`
    pub fn snapshot(snapshot_id: impl Into<String>, meta: ObjectMeta) -> Self {
        Self {
            version_id: VersionId::Snapshot(snapshot_id.into()),
            origin: VersionOrigin::Snapshot,
            size: meta.size,
            modified: meta.modified,
            is_current: false,
        }
    }

    /// Newest first at whole-second precision, then live first, then
    /// snapshot id descending.
    ///
    /// S3 reports sub-second modification times while stat reports whole
    /// seconds, so the same instant seen through both must compare equal.
    pub fn history_order(&self, other: &Self) -> Ordering {
        other
            .modified
            .timestamp()
            .cmp(&self.modified.timestamp())
            .then_with(|| other.is_current.cmp(&self.is_current))
            .then_with(|| other.version_id.as_str().cmp(self.version_id.as_str()))
    }
}

/// Sort records into history order
pub fn sort_history(records: &mut [VersionRecord]) {
    records.sort_by(VersionRecord::history_order);
}

/// Version history of one object
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionListing {
    pub address: ObjectAddress,
    pub versions: Vec<VersionRecord>,
    /// Snapshots whose check failed softly and are missing from `versions`
    pub skipped_snapshots: Vec<String>,
}

impl VersionListing {
    /// True when every known snapshot contributed an answer
    pub fn is_complete(&self) -> bool {
        self.skipped_snapshots.is_empty()
    }

    /// The live record, if the object currently exists
    pub fn current(&self) -> Option<&VersionRecord> {
        self.versions.iter().find(|v| v.is_current)
    }
}
