//! # Local Filesystem Sources
//!
//! Both sources read the storage provider's home directory through a local
//! path: a mount of the remote filesystem, or a plain tree in tests.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs;

use super::backend::{
    ContainerEntry, EntryMeta, FolderEntry, LiveObjectSource, ObjectEntry, ObjectListing,
    ObjectMeta, ObjectStream, SnapshotDirectorySource,
};
use super::errors::{SourceError, SourceResult};
use crate::versions::{ObjectAddress, ObjectPrefix, PathLayout};

/// Live objects read directly from the mirrored root
#[derive(Debug, Clone)]
pub struct LocalLiveSource {
    base: PathBuf,
    layout: PathLayout,
}

impl LocalLiveSource {
    /// Create a live source over the storage home at `base`
    pub fn new(base: PathBuf, layout: PathLayout) -> Self {
        Self { base, layout }
    }
}

#[async_trait]
impl LiveObjectSource for LocalLiveSource {
    async fn head_object(&self, address: &ObjectAddress) -> SourceResult<ObjectMeta> {
        stat_object(&self.base, &self.layout.live_object_path(address)).await
    }

    async fn open_object_stream(&self, address: &ObjectAddress) -> SourceResult<ObjectStream> {
        open_object(&self.base, &self.layout.live_object_path(address)).await
    }

    async fn list_containers(&self) -> SourceResult<Vec<ContainerEntry>> {
        let root = self.layout.mirrored_root().to_string();
        let mut entries = fs::read_dir(self.base.join(&root))
            .await
            .map_err(|e| SourceError::from_io(&root, e))?;

        let mut containers = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::from_io(&root, e))?
        {
            let Some(name) = visible_name(&entry) else {
                continue;
            };
            let meta = entry
                .metadata()
                .await
                .map_err(|e| SourceError::from_io(&root, e))?;
            if meta.is_dir() {
                containers.push(ContainerEntry {
                    name,
                    created: meta.created().ok().map(DateTime::<Utc>::from),
                });
            }
        }

        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    async fn list_objects(&self, prefix: &ObjectPrefix) -> SourceResult<ObjectListing> {
        let container = self.layout.live_container_path(prefix.container());
        let meta = fs::metadata(self.base.join(&container))
            .await
            .map_err(|e| SourceError::from_io(&container, e))?;
        if !meta.is_dir() {
            return Err(SourceError::NotFound(container));
        }

        // A folder that does not exist holds no keys
        let folder = self.layout.live_folder_path(prefix);
        let mut entries = match fs::metadata(self.base.join(&folder)).await {
            Ok(meta) if meta.is_dir() => fs::read_dir(self.base.join(&folder))
                .await
                .map_err(|e| SourceError::from_io(&folder, e))?,
            Ok(_) => return Ok(ObjectListing::default()),
            Err(e) => match SourceError::from_io(&folder, e) {
                SourceError::NotFound(_) => return Ok(ObjectListing::default()),
                err => return Err(err),
            },
        };

        let mut listing = ObjectListing::default();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::from_io(&folder, e))?
        {
            let Some(name) = visible_name(&entry) else {
                continue;
            };
            if !name.starts_with(prefix.name_start()) {
                continue;
            }
            let meta = entry
                .metadata()
                .await
                .map_err(|e| SourceError::from_io(&folder, e))?;

            let key = prefix.child_key(&name);
            if meta.is_dir() {
                listing.folders.push(FolderEntry {
                    name,
                    prefix: format!("{}/", key),
                });
            } else {
                listing.objects.push(ObjectEntry {
                    modified: modified_time(&meta, &key)?,
                    size: meta.len(),
                    name,
                    key,
                });
            }
        }

        Ok(listing.sorted())
    }
}

/// Snapshot namespace read from `<base>/<snapshot-root>`
#[derive(Debug, Clone)]
pub struct LocalSnapshotSource {
    base: PathBuf,
    layout: PathLayout,
}

impl LocalSnapshotSource {
    /// Create a snapshot source over the storage home at `base`
    pub fn new(base: PathBuf, layout: PathLayout) -> Self {
        Self { base, layout }
    }
}

#[async_trait]
impl SnapshotDirectorySource for LocalSnapshotSource {
    async fn list_snapshot_identifiers(&self) -> SourceResult<Vec<String>> {
        let root = self.layout.snapshot_root().to_string();
        let mut entries = fs::read_dir(self.base.join(&root))
            .await
            .map_err(|e| SourceError::from_io(&root, e))?;

        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| SourceError::from_io(&root, e))?
        {
            if let Some(name) = visible_name(&entry) {
                ids.push(name);
            }
        }

        ids.sort();
        Ok(ids)
    }

    async fn stat_mirrored_root(&self, snapshot_id: &str) -> SourceResult<EntryMeta> {
        let remote = self.layout.mirrored_root_path(snapshot_id);
        let meta = fs::metadata(self.base.join(&remote))
            .await
            .map_err(|e| SourceError::from_io(&remote, e))?;

        Ok(EntryMeta {
            modified: modified_time(&meta, &remote)?,
            is_dir: meta.is_dir(),
        })
    }

    async fn stat_under_snapshot(
        &self,
        snapshot_id: &str,
        address: &ObjectAddress,
    ) -> SourceResult<ObjectMeta> {
        let remote = self.layout.snapshot_object_path(address, snapshot_id);
        stat_object(&self.base, &remote).await
    }

    async fn open_stream_under_snapshot(
        &self,
        snapshot_id: &str,
        address: &ObjectAddress,
    ) -> SourceResult<ObjectStream> {
        let remote = self.layout.snapshot_object_path(address, snapshot_id);
        open_object(&self.base, &remote).await
    }
}

async fn stat_object(base: &Path, remote: &str) -> SourceResult<ObjectMeta> {
    let meta = fs::metadata(base.join(remote))
        .await
        .map_err(|e| SourceError::from_io(remote, e))?;

    // A directory is a prefix, not an object
    if meta.is_dir() {
        return Err(SourceError::NotFound(remote.to_string()));
    }

    Ok(ObjectMeta {
        size: meta.len(),
        modified: modified_time(&meta, remote)?,
    })
}

async fn open_object(base: &Path, remote: &str) -> SourceResult<ObjectStream> {
    let file = fs::File::open(base.join(remote))
        .await
        .map_err(|e| SourceError::from_io(remote, e))?;

    let meta = file
        .metadata()
        .await
        .map_err(|e| SourceError::from_io(remote, e))?;
    if meta.is_dir() {
        return Err(SourceError::NotFound(remote.to_string()));
    }

    Ok(ObjectStream::new(Box::pin(file), Some(meta.len())))
}

/// UTF-8 name of a non-hidden entry
///
/// Non UTF-8 names cannot be addressed by a version id or an object key.
fn visible_name(entry: &fs::DirEntry) -> Option<String> {
    entry
        .file_name()
        .to_str()
        .filter(|name| !name.starts_with('.'))
        .map(str::to_string)
}

fn modified_time(meta: &std::fs::Metadata, remote: &str) -> SourceResult<DateTime<Utc>> {
    meta.modified()
        .map(DateTime::<Utc>::from)
        .map_err(|e| SourceError::from_io(remote, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;

    fn layout() -> PathLayout {
        PathLayout::new(".zfs/snapshot", "s3root")
    }

    fn address() -> ObjectAddress {
        ObjectAddress::new("bucket", "docs/a.txt").unwrap()
    }

    fn write(base: &Path, rel: &str, data: &[u8]) {
        let path = base.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[tokio::test]
    async fn test_live_head_and_read() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "s3root/bucket/docs/a.txt", b"hello");

        let source = LocalLiveSource::new(temp.path().to_path_buf(), layout());
        let meta = source.head_object(&address()).await.unwrap();
        assert_eq!(meta.size, 5);

        let mut stream = source.open_object_stream(&address()).await.unwrap();
        assert_eq!(stream.size, Some(5));
        let mut buf = Vec::new();
        stream.reader.read_to_end(&mut buf).await.unwrap();
        assert_eq!(buf, b"hello");
    }

    #[tokio::test]
    async fn test_live_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let source = LocalLiveSource::new(temp.path().to_path_buf(), layout());

        let result = source.head_object(&address()).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));

        let result = source.open_object_stream(&address()).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_directory_is_not_an_object() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("s3root/bucket/docs/a.txt")).unwrap();

        let source = LocalLiveSource::new(temp.path().to_path_buf(), layout());
        let result = source.head_object(&address()).await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_snapshot_identifiers_skips_hidden() {
        let temp = TempDir::new().unwrap();
        for name in ["daily_2025-12-01", "hourly_2025-12-01_14", ".hidden"] {
            std::fs::create_dir_all(temp.path().join(".zfs/snapshot").join(name)).unwrap();
        }

        let source = LocalSnapshotSource::new(temp.path().to_path_buf(), layout());
        let ids = source.list_snapshot_identifiers().await.unwrap();
        assert_eq!(ids, vec!["daily_2025-12-01", "hourly_2025-12-01_14"]);
    }

    #[tokio::test]
    async fn test_missing_snapshot_root_is_not_found() {
        let temp = TempDir::new().unwrap();
        let source = LocalSnapshotSource::new(temp.path().to_path_buf(), layout());

        let result = source.list_snapshot_identifiers().await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stat_under_snapshot() {
        let temp = TempDir::new().unwrap();
        write(
            temp.path(),
            ".zfs/snapshot/daily_2025-12-01/s3root/bucket/docs/a.txt",
            b"old",
        );

        let source = LocalSnapshotSource::new(temp.path().to_path_buf(), layout());
        let root = source.stat_mirrored_root("daily_2025-12-01").await.unwrap();
        assert!(root.is_dir);

        let meta = source
            .stat_under_snapshot("daily_2025-12-01", &address())
            .await
            .unwrap();
        assert_eq!(meta.size, 3);

        let missing = source.stat_under_snapshot("other", &address()).await;
        assert!(matches!(missing, Err(SourceError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_list_containers_skips_files_and_hidden() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "s3root/bucket/docs/a.txt", b"a");
        write(temp.path(), "s3root/stray.txt", b"x");
        std::fs::create_dir_all(temp.path().join("s3root/archive")).unwrap();
        std::fs::create_dir_all(temp.path().join("s3root/.minio.sys")).unwrap();

        let source = LocalLiveSource::new(temp.path().to_path_buf(), layout());
        let names: Vec<String> = source
            .list_containers()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["archive", "bucket"]);
    }

    #[tokio::test]
    async fn test_list_objects_splits_folders() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "s3root/bucket/docs/a.txt", b"a");
        write(temp.path(), "s3root/bucket/docs/report.pdf", b"pdf");
        write(temp.path(), "s3root/bucket/docs/reports/q1.pdf", b"q1");
        write(temp.path(), "s3root/bucket/top.txt", b"top");

        let source = LocalLiveSource::new(temp.path().to_path_buf(), layout());

        let root = source
            .list_objects(&ObjectPrefix::new("bucket", "").unwrap())
            .await
            .unwrap();
        assert_eq!(root.folders.len(), 1);
        assert_eq!(root.folders[0].prefix, "docs/");
        assert_eq!(root.objects.len(), 1);
        assert_eq!(root.objects[0].key, "top.txt");

        let partial = source
            .list_objects(&ObjectPrefix::new("bucket", "docs/rep").unwrap())
            .await
            .unwrap();
        assert_eq!(partial.folders[0].prefix, "docs/reports/");
        assert_eq!(partial.objects.len(), 1);
        assert_eq!(partial.objects[0].key, "docs/report.pdf");
        assert_eq!(partial.objects[0].size, 3);

        let missing = source
            .list_objects(&ObjectPrefix::new("bucket", "nope/").unwrap())
            .await
            .unwrap();
        assert_eq!(missing, ObjectListing::default());
    }

    #[tokio::test]
    async fn test_list_objects_in_missing_container() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("s3root")).unwrap();

        let source = LocalLiveSource::new(temp.path().to_path_buf(), layout());
        let result = source
            .list_objects(&ObjectPrefix::new("ghost", "").unwrap())
            .await;
        assert!(matches!(result, Err(SourceError::NotFound(_))));
    }
}
