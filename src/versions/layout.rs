//! Cross-source path rewriting
//!
//! The live object and each of its historical copies are the paths that
//! differ only by the `<snapshot-root>/<snapshot-id>/` prefix. Nothing else
//! relates two paths as versions of one object.

use super::address::{ObjectAddress, ObjectPrefix};

/// Fixed directory names shared by the live tree and every snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathLayout {
    snapshot_root: String,
    mirrored_root: String,
}

impl PathLayout {
    /// `mirrored_root` of `""` or `"."` means the storage home itself is mirrored
    pub fn new(snapshot_root: impl Into<String>, mirrored_root: impl Into<String>) -> Self {
        let snapshot_root = snapshot_root.into().trim_matches('/').to_string();
        let mirrored_root = mirrored_root.into().trim_matches('/').to_string();
        let mirrored_root = if mirrored_root == "." {
            String::new()
        } else {
            mirrored_root
        };

        Self {
            snapshot_root,
            mirrored_root,
        }
    }

    pub fn snapshot_root(&self) -> &str {
        &self.snapshot_root
    }

    pub fn mirrored_root(&self) -> &str {
        &self.mirrored_root
    }

    /// `<mirrored-root>/<container>/<path>`
    pub fn live_object_path(&self, address: &ObjectAddress) -> String {
        join(&[&self.mirrored_root, address.container(), address.path()])
    }

    /// `<mirrored-root>/<container>`
    pub fn live_container_path(&self, container: &str) -> String {
        join(&[&self.mirrored_root, container])
    }

    /// `<mirrored-root>/<container>/<folder>`, the directory listed for `prefix`
    pub fn live_folder_path(&self, prefix: &ObjectPrefix) -> String {
        join(&[&self.mirrored_root, prefix.container(), prefix.folder()])
    }

    /// `<snapshot-root>/<s>/<mirrored-root>`
    pub fn mirrored_root_path(&self, snapshot_id: &str) -> String {
        join(&[&self.snapshot_root, snapshot_id, &self.mirrored_root])
    }

    /// `<snapshot-root>/<s>/<mirrored-root>/<container>/<path>`
    pub fn snapshot_object_path(&self, address: &ObjectAddress, snapshot_id: &str) -> String {
        join(&[
            &self.snapshot_root,
            snapshot_id,
            &self.mirrored_root,
            address.container(),
            address.path(),
        ])
    }

    /// Live path for `None`, snapshot path otherwise
    pub fn object_path(&self, address: &ObjectAddress, snapshot_id: Option<&str>) -> String {
        match snapshot_id {
            Some(id) => self.snapshot_object_path(address, id),
            None => self.live_object_path(address),
        }
    }
}

impl Default for PathLayout {
    fn default() -> Self {
        Self::new(".zfs/snapshot", "s3root")
    }
}

fn join(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/")
}
