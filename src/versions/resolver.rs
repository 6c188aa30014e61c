//! Version resolver
//!
//! Reconciles the live object with its snapshot copies into one history,
//! and turns a chosen version id back into a byte stream.
//!
//! # Concurrency
//!
//! The live check, snapshot discovery and every per-snapshot check are
//! plain futures joined in place; nothing is spawned. Dropping the returned
//! future, or firing the cancellation token, drops every in-flight query and
//! the handles it holds. The merged result does not depend on completion
//! order.
//!
//! # Failure policy
//!
//! - live check unavailable: the whole call fails
//! - one snapshot unavailable: left out and named in `skipped_snapshots`
//! - not found anywhere: `NotFound`, unless a skipped snapshot might have
//!   held the object, in which case `SourceUnavailable`

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::stream::{self, StreamExt};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf};
use tokio_util::sync::CancellationToken;

use super::address::{ObjectAddress, ObjectPrefix};
use super::errors::{VersionError, VersionResult};
use super::query::{QueryPolicy, ResolverOptions};
use super::record::{sort_history, VersionId, VersionListing, VersionRecord};
use super::snapshot::{CatalogScan, SnapshotCatalog};
use crate::observability::{
    log_event_with_fields, Event, ObservationScope, ResolverMetrics, Severity,
};
use crate::sources::{
    ContainerEntry, ContentStream, LiveObjectSource, ObjectListing, ObjectStream,
    SnapshotDirectorySource, SourceError,
};

/// Upper bound for the initial buffer of `ContentHandle::read_to_vec`
const MAX_PREALLOCATION: u64 = 8 * 1024 * 1024;

/// Bytes of one resolved version
///
/// Owns the underlying stream; dropping the handle releases the file or
/// connection behind it.
pub struct ContentHandle {
    record: VersionRecord,
    stream: ContentStream,
    content_length: Option<u64>,
}

impl ContentHandle {
    pub fn new(record: VersionRecord, opened: ObjectStream) -> Self {
        Self {
            record,
            stream: opened.reader,
            content_length: opened.size,
        }
    }

    /// Metadata of the version being read
    pub fn record(&self) -> &VersionRecord {
        &self.record
    }

    /// Length of the opened stream, when the source reported one
    ///
    /// May differ from `record().size` if the object changed between the
    /// stat and the open.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Read the whole version into memory
    pub async fn read_to_vec(mut self) -> VersionResult<Vec<u8>> {
        let expected = self.content_length.unwrap_or(self.record.size);
        let mut buf = Vec::with_capacity(expected.min(MAX_PREALLOCATION) as usize);
        self.stream.read_to_end(&mut buf).await.map_err(|e| {
            VersionError::SourceUnavailable(format!("read of {} failed: {}", self.record.version_id, e))
        })?;
        Ok(buf)
    }
}

impl AsyncRead for ContentHandle {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.get_mut().stream.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for ContentHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentHandle")
            .field("record", &self.record)
            .finish_non_exhaustive()
    }
}

/// Builds version histories from a live source and a snapshot source
#[derive(Clone)]
pub struct VersionResolver {
    live: Arc<dyn LiveObjectSource>,
    snapshots: Arc<dyn SnapshotDirectorySource>,
    catalog: SnapshotCatalog,
    policy: QueryPolicy,
}

impl VersionResolver {
    pub fn new(
        live: Arc<dyn LiveObjectSource>,
        snapshots: Arc<dyn SnapshotDirectorySource>,
        options: ResolverOptions,
    ) -> Self {
        let policy = QueryPolicy::new(options, Arc::new(ResolverMetrics::new()));
        Self {
            catalog: SnapshotCatalog::new(Arc::clone(&snapshots), policy.clone()),
            live,
            snapshots,
            policy,
        }
    }

    pub fn metrics(&self) -> Arc<ResolverMetrics> {
        Arc::clone(self.policy.metrics())
    }

    /// Version history of `address`, newest first
    pub async fn list_versions(
        &self,
        address: &ObjectAddress,
        cancel: &CancellationToken,
    ) -> VersionResult<VersionListing> {
        let target = address.to_string();
        let scope = ObservationScope::with_fields("LIST_VERSIONS", &[("address", target.as_str())]);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VersionError::Cancelled),
            result = self.gather(address) => result,
        };

        let metrics = self.policy.metrics();
        match &result {
            Ok(listing) => {
                metrics.increment_listings_served();
                metrics.add_snapshots_skipped(listing.skipped_snapshots.len() as u64);
                scope.complete_with_fields(&[
                    ("versions", listing.versions.len().to_string().as_str()),
                    ("skipped", listing.skipped_snapshots.len().to_string().as_str()),
                ]);
            }
            Err(err) => {
                if *err == VersionError::Cancelled {
                    metrics.increment_cancellations();
                }
                metrics.increment_listings_failed();
                scope.fail_with_severity(failure_severity(err), &err.to_string());
            }
        }

        result
    }

    /// Open the bytes of one version of `address`
    pub async fn resolve_content(
        &self,
        address: &ObjectAddress,
        version: &VersionId,
        cancel: &CancellationToken,
    ) -> VersionResult<ContentHandle> {
        let target = address.to_string();
        let scope = ObservationScope::with_fields(
            "RESOLVE_CONTENT",
            &[("address", target.as_str()), ("version", version.as_str())],
        );

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VersionError::Cancelled),
            result = self.open_version(address, version) => result,
        };

        let metrics = self.policy.metrics();
        match &result {
            Ok(handle) => {
                metrics.increment_contents_resolved();
                scope.complete_with_fields(&[("size", handle.record().size.to_string().as_str())]);
            }
            Err(err) => {
                if *err == VersionError::Cancelled {
                    metrics.increment_cancellations();
                }
                metrics.increment_contents_failed();
                scope.fail_with_severity(failure_severity(err), &err.to_string());
            }
        }

        result
    }

    /// Valid snapshots, newest first
    pub async fn list_snapshots(&self, cancel: &CancellationToken) -> VersionResult<CatalogScan> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VersionError::Cancelled),
            result = self.catalog.discover() => result,
        }
    }

    /// Containers of the live source, by name
    pub async fn list_containers(
        &self,
        cancel: &CancellationToken,
    ) -> VersionResult<Vec<ContainerEntry>> {
        let scope = ObservationScope::new("LIST_CONTAINERS");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VersionError::Cancelled),
            result = self.policy.run("list containers", self.live.list_containers()) => {
                result.map_err(VersionError::from)
            }
        };

        match &result {
            Ok(containers) => {
                scope.complete_with_fields(&[("containers", containers.len().to_string().as_str())])
            }
            Err(err) => scope.fail_with_severity(failure_severity(err), &err.to_string()),
        }
        result
    }

    /// One folder level of the live tree below `prefix`
    pub async fn list_objects(
        &self,
        prefix: &ObjectPrefix,
        cancel: &CancellationToken,
    ) -> VersionResult<ObjectListing> {
        let scope = ObservationScope::with_fields(
            "LIST_OBJECTS",
            &[("container", prefix.container()), ("prefix", prefix.prefix())],
        );
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VersionError::Cancelled),
            result = self.policy.run("list objects", self.live.list_objects(prefix)) => {
                result.map_err(VersionError::from)
            }
        };

        match &result {
            Ok(listing) => scope.complete_with_fields(&[
                ("folders", listing.folders.len().to_string().as_str()),
                ("objects", listing.objects.len().to_string().as_str()),
            ]),
            Err(err) => scope.fail_with_severity(failure_severity(err), &err.to_string()),
        }
        result
    }

    /// Metadata of the live object only
    pub async fn describe_object(
        &self,
        address: &ObjectAddress,
        cancel: &CancellationToken,
    ) -> VersionResult<VersionRecord> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(VersionError::Cancelled),
            result = self.policy.run("live head", self.live.head_object(address)) => {
                result.map(VersionRecord::live).map_err(VersionError::from)
            }
        }
    }

    async fn gather(&self, address: &ObjectAddress) -> VersionResult<VersionListing> {
        let (current, (mut versions, skipped_snapshots)) =
            tokio::try_join!(self.check_live(address), self.check_snapshots(address))?;

        versions.extend(current);
        sort_history(&mut versions);

        if versions.is_empty() {
            if !skipped_snapshots.is_empty() {
                return Err(VersionError::SourceUnavailable(format!(
                    "{} not found in any reachable source; unavailable snapshots: {}",
                    address,
                    skipped_snapshots.join(", ")
                )));
            }
            return Err(VersionError::NotFound(address.to_string()));
        }

        Ok(VersionListing {
            address: address.clone(),
            versions,
            skipped_snapshots,
        })
    }

    async fn check_live(&self, address: &ObjectAddress) -> VersionResult<Option<VersionRecord>> {
        match self.policy.run("live head", self.live.head_object(address)).await {
            Ok(meta) => Ok(Some(VersionRecord::live(meta))),
            Err(SourceError::NotFound(_)) => Ok(None),
            Err(SourceError::Unavailable(reason)) => Err(VersionError::SourceUnavailable(reason)),
        }
    }

    async fn check_snapshots(
        &self,
        address: &ObjectAddress,
    ) -> VersionResult<(Vec<VersionRecord>, Vec<String>)> {
        let scan = self.catalog.discover().await?;

        let snapshots = &self.snapshots;
        let policy = &self.policy;
        let lookups: Vec<_> = scan
            .snapshots
            .iter()
            .map(|snapshot| async move {
                let outcome = policy
                    .run(
                        &format!("stat in {}", snapshot.id),
                        snapshots.stat_under_snapshot(&snapshot.id, address),
                    )
                    .await;
                (snapshot.id.as_str(), outcome)
            })
            .collect();
        let outcomes: Vec<_> = stream::iter(lookups)
            .buffer_unordered(policy.concurrency())
            .collect()
            .await;

        let mut records = Vec::new();
        let mut skipped = scan.unavailable.clone();
        for (id, outcome) in outcomes {
            match outcome {
                Ok(meta) => records.push(VersionRecord::snapshot(id, meta)),
                Err(SourceError::NotFound(_)) => {}
                Err(SourceError::Unavailable(reason)) => {
                    log_event_with_fields(
                        Event::SnapshotSkipped,
                        Severity::Warn,
                        &[("snapshot", id), ("reason", reason.as_str())],
                    );
                    skipped.push(id.to_string());
                }
            }
        }

        skipped.sort();
        Ok((records, skipped))
    }

    async fn open_version(
        &self,
        address: &ObjectAddress,
        version: &VersionId,
    ) -> VersionResult<ContentHandle> {
        match version {
            VersionId::Current => {
                let meta = self.policy.run("live head", self.live.head_object(address)).await?;
                let opened = self
                    .policy
                    .run("live open", self.live.open_object_stream(address))
                    .await?;
                Ok(ContentHandle::new(VersionRecord::live(meta), opened))
            }
            VersionId::Snapshot(id) => {
                self.catalog.lookup(id).await?;

                let meta = self
                    .policy
                    .run(
                        &format!("stat in {}", id),
                        self.snapshots.stat_under_snapshot(id, address),
                    )
                    .await?;
                let opened = self
                    .policy
                    .run(
                        &format!("open in {}", id),
                        self.snapshots.open_stream_under_snapshot(id, address),
                    )
                    .await?;
                Ok(ContentHandle::new(VersionRecord::snapshot(id.clone(), meta), opened))
            }
        }
    }
}

/// Expected outcomes are logged below ERROR
fn failure_severity(err: &VersionError) -> Severity {
    match err {
        VersionError::SourceUnavailable(_) => Severity::Error,
        _ => Severity::Warn,
    }
}
