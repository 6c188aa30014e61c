//! # Source Traits
//!
//! The two capabilities the version resolver consumes. Each implementation
//! owns its own connection lifecycle; every call is an independent request.

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncRead;

use super::errors::SourceResult;
use crate::versions::{ObjectAddress, ObjectPrefix};

/// Byte stream of one object version. Dropping it releases the handle.
pub type ContentStream = Pin<Box<dyn AsyncRead + Send>>;

/// Size and modification time of an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectMeta {
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Metadata of a directory entry that may not be an object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub modified: DateTime<Utc>,
    pub is_dir: bool,
}

/// An opened object
pub struct ObjectStream {
    pub reader: ContentStream,
    /// Length reported by the handle that was opened, when the source knows it
    pub size: Option<u64>,
}

impl ObjectStream {
    pub fn new(reader: ContentStream, size: Option<u64>) -> Self {
        Self { reader, size }
    }
}

/// A top-level container (a bucket on the gateway)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerEntry {
    pub name: String,
    pub created: Option<DateTime<Utc>>,
}

/// A folder one level below the listed prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderEntry {
    pub name: String,
    /// Prefix to list the folder's contents, with a trailing `/`
    pub prefix: String,
}

/// An object directly below the listed prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    pub name: String,
    pub key: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// One level of a container, split at `/`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectListing {
    pub folders: Vec<FolderEntry>,
    pub objects: Vec<ObjectEntry>,
}

impl ObjectListing {
    /// Order folders and objects by name
    pub fn sorted(mut self) -> Self {
        self.folders.sort_by(|a, b| a.name.cmp(&b.name));
        self.objects.sort_by(|a, b| a.name.cmp(&b.name));
        self
    }
}

/// Current state of objects, as seen through the S3 gateway
#[async_trait]
pub trait LiveObjectSource: Send + Sync {
    /// Metadata of the live object
    async fn head_object(&self, address: &ObjectAddress) -> SourceResult<ObjectMeta>;

    /// Open a read stream over the live object
    async fn open_object_stream(&self, address: &ObjectAddress) -> SourceResult<ObjectStream>;

    /// Every container the source exposes
    async fn list_containers(&self) -> SourceResult<Vec<ContainerEntry>>;

    /// Folders and objects one level below `prefix`
    async fn list_objects(&self, prefix: &ObjectPrefix) -> SourceResult<ObjectListing>;
}

/// The hidden snapshot namespace of the storage provider
#[async_trait]
pub trait SnapshotDirectorySource: Send + Sync {
    /// Raw entry names under the snapshot root, hidden entries excluded
    async fn list_snapshot_identifiers(&self) -> SourceResult<Vec<String>>;

    /// Metadata of the mirrored root inside one snapshot
    async fn stat_mirrored_root(&self, snapshot_id: &str) -> SourceResult<EntryMeta>;

    /// Metadata of an object inside one snapshot
    async fn stat_under_snapshot(
        &self,
        snapshot_id: &str,
        address: &ObjectAddress,
    ) -> SourceResult<ObjectMeta>;

    /// Open a read stream over an object inside one snapshot
    async fn open_stream_under_snapshot(
        &self,
        snapshot_id: &str,
        address: &ObjectAddress,
    ) -> SourceResult<ObjectStream>;
}
