//! Snapshot discovery
//!
//! The snapshot root may hold entries unrelated to the live store (system
//! snapshots, other datasets). Only entries whose mirrored root exists as a
//! directory become `SnapshotDescriptor`s. Discovery runs fresh on every call.

use std::cmp::Ordering;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use futures_util::stream::{self, StreamExt};
use regex::Regex;
use serde::Serialize;

use super::errors::{VersionError, VersionResult};
use super::query::QueryPolicy;
use crate::observability::{log_event_with_fields, Event, Severity};
use crate::sources::{EntryMeta, SnapshotDirectorySource, SourceError, SourceResult};

/// A snapshot known to contain the mirrored root
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotDescriptor {
    pub id: String,
    /// Time encoded in the snapshot name, if it follows a known pattern
    pub timestamp: Option<DateTime<Utc>>,
    /// Modification time of the snapshot's mirrored root
    pub root_modified: DateTime<Utc>,
}

impl SnapshotDescriptor {
    pub fn new(id: impl Into<String>, root_modified: DateTime<Utc>) -> Self {
        let id = id.into();
        Self {
            timestamp: parse_snapshot_time(&id),
            id,
            root_modified,
        }
    }

    /// Name-derived time, falling back to filesystem metadata
    pub fn ordering_key(&self) -> DateTime<Utc> {
        self.timestamp.unwrap_or(self.root_modified)
    }

    /// Newest first, then id descending
    pub fn newest_first(&self, other: &Self) -> Ordering {
        other
            .ordering_key()
            .cmp(&self.ordering_key())
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// Extract the time from provider snapshot names
///
/// Recognized: `*_YYYY-MM-DD_HH`, `*_YYYY-MM-DD`, `*_YYYY-MM`
/// (`hourly_2025-12-01_14`, `daily_2025-12-01`, `monthly_2025-12`).
pub fn parse_snapshot_time(id: &str) -> Option<DateTime<Utc>> {
    let [hourly, daily, monthly] = name_patterns();

    let parsed = hourly
        .captures(id)
        .and_then(|c| {
            let date = NaiveDate::parse_from_str(&c[1], "%Y-%m-%d").ok()?;
            date.and_hms_opt(c[2].parse().ok()?, 0, 0)
        })
        .or_else(|| {
            daily.captures(id).and_then(|c| {
                NaiveDate::parse_from_str(&c[1], "%Y-%m-%d")
                    .ok()?
                    .and_hms_opt(0, 0, 0)
            })
        })
        .or_else(|| {
            monthly.captures(id).and_then(|c| {
                NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, 1)?
                    .and_hms_opt(0, 0, 0)
            })
        })?;

    Some(Utc.from_utc_datetime(&parsed))
}

fn name_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r".*_(\d{4}-\d{2}-\d{2})_(\d{2})").expect("hourly pattern"),
            Regex::new(r".*_(\d{4}-\d{2}-\d{2})").expect("daily pattern"),
            Regex::new(r".*_(\d{4})-(\d{2})").expect("monthly pattern"),
        ]
    })
}

/// Result of one discovery pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogScan {
    /// Valid snapshots, newest first
    pub snapshots: Vec<SnapshotDescriptor>,
    /// Entries whose mirrored-root check failed softly
    pub unavailable: Vec<String>,
}

/// Enumerates and filters the snapshot namespace
#[derive(Clone)]
pub struct SnapshotCatalog {
    source: Arc<dyn SnapshotDirectorySource>,
    policy: QueryPolicy,
}

impl SnapshotCatalog {
    pub fn new(source: Arc<dyn SnapshotDirectorySource>, policy: QueryPolicy) -> Self {
        Self { source, policy }
    }

    /// List valid snapshots
    ///
    /// A missing snapshot root yields an empty scan. A failure to list the
    /// root fails the call, since no snapshot could be accounted for.
    pub async fn discover(&self) -> VersionResult<CatalogScan> {
        let ids = match self
            .policy
            .run("list snapshots", self.source.list_snapshot_identifiers())
            .await
        {
            Ok(ids) => ids,
            Err(SourceError::NotFound(root)) => {
                log_event_with_fields(Event::SnapshotRootMissing, Severity::Trace, &[("root", root.as_str())]);
                return Ok(CatalogScan::default());
            }
            Err(SourceError::Unavailable(reason)) => {
                return Err(VersionError::SourceUnavailable(reason));
            }
        };

        let source = &self.source;
        let policy = &self.policy;
        let outcomes: Vec<(String, SourceResult<EntryMeta>)> = stream::iter(ids)
            .map(|id| async move {
                let outcome = policy
                    .run(&format!("mirrored root of {}", id), source.stat_mirrored_root(&id))
                    .await;
                (id, outcome)
            })
            .buffer_unordered(policy.concurrency())
            .collect()
            .await;

        let mut scan = CatalogScan::default();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(entry) if entry.is_dir => {
                    scan.snapshots.push(SnapshotDescriptor::new(id, entry.modified));
                }
                Ok(_) | Err(SourceError::NotFound(_)) => {
                    log_event_with_fields(Event::SnapshotExcluded, Severity::Trace, &[("snapshot", id.as_str())]);
                }
                Err(SourceError::Unavailable(reason)) => {
                    log_event_with_fields(
                        Event::SnapshotSkipped,
                        Severity::Warn,
                        &[("snapshot", id.as_str()), ("reason", reason.as_str())],
                    );
                    scan.unavailable.push(id);
                }
            }
        }

        scan.snapshots.sort_by(SnapshotDescriptor::newest_first);
        scan.unavailable.sort();
        Ok(scan)
    }

    /// Check that `id` names a valid snapshot, without scanning the others
    ///
    /// An id that is not listed, or whose mirrored root is missing, is
    /// `UnknownVersion`. An unreachable mirrored root is `SourceUnavailable`.
    pub async fn lookup(&self, id: &str) -> VersionResult<SnapshotDescriptor> {
        let ids = match self
            .policy
            .run("list snapshots", self.source.list_snapshot_identifiers())
            .await
        {
            Ok(ids) => ids,
            Err(SourceError::NotFound(_)) => {
                return Err(VersionError::UnknownVersion(id.to_string()));
            }
            Err(SourceError::Unavailable(reason)) => {
                return Err(VersionError::SourceUnavailable(reason));
            }
        };
        if !ids.iter().any(|listed| listed == id) {
            return Err(VersionError::UnknownVersion(id.to_string()));
        }

        match self
            .policy
            .run(&format!("mirrored root of {}", id), self.source.stat_mirrored_root(id))
            .await
        {
            Ok(entry) if entry.is_dir => Ok(SnapshotDescriptor::new(id, entry.modified)),
            Ok(_) | Err(SourceError::NotFound(_)) => {
                Err(VersionError::UnknownVersion(id.to_string()))
            }
            Err(SourceError::Unavailable(reason)) => Err(VersionError::SourceUnavailable(format!(
                "snapshot {} is unreachable: {}",
                id, reason
            ))),
        }
    }
}
