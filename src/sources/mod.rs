//! # Object Sources
//!
//! Where version bytes come from: the live store and the snapshot namespace.
//! The live store is read through the S3 gateway or a local tree, the
//! snapshot namespace over SFTP or a local tree.

pub mod backend;
pub mod errors;
pub mod local;
pub mod s3;
pub mod sftp;

pub use backend::{
    ContainerEntry, ContentStream, EntryMeta, FolderEntry, LiveObjectSource, ObjectEntry,
    ObjectListing, ObjectMeta, ObjectStream, SnapshotDirectorySource,
};
pub use errors::{SourceError, SourceResult};
pub use local::{LocalLiveSource, LocalSnapshotSource};
pub use s3::S3LiveSource;
pub use sftp::SftpSnapshotSource;
