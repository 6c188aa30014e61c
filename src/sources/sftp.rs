//! # SFTP Snapshot Source
//!
//! Reads the snapshot namespace of a provider that is reachable only over
//! SSH. Every call opens its own session, authenticated with a private key.
//! Relative layout paths resolve against the login directory.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use russh::client::{self, Handle};
use russh_keys::key::PublicKey;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::fs::Metadata;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::StatusCode;
use tokio::io::{AsyncRead, ReadBuf};

use super::backend::{ContentStream, EntryMeta, ObjectMeta, ObjectStream, SnapshotDirectorySource};
use super::errors::{SourceError, SourceResult};
use crate::config::SftpSettings;
use crate::observability::{log_event_with_fields, Event, Severity};
use crate::versions::{ObjectAddress, PathLayout};

/// Snapshot namespace read over SFTP
pub struct SftpSnapshotSource {
    settings: SftpSettings,
    layout: PathLayout,
    ssh: Arc<client::Config>,
}

impl SftpSnapshotSource {
    pub fn new(settings: SftpSettings, layout: PathLayout) -> Self {
        if settings.known_hosts.is_none() {
            log_event_with_fields(
                Event::HostKeyUnchecked,
                Severity::Warn,
                &[("host", settings.host.as_str())],
            );
        }

        Self {
            settings,
            layout,
            ssh: Arc::new(client::Config::default()),
        }
    }

    async fn connect(&self) -> SourceResult<Session> {
        let target = format!("{}@{}:{}", self.settings.user, self.settings.host, self.settings.port);
        let unavailable = |stage: &str, err: &dyn std::fmt::Display| {
            SourceError::Unavailable(format!("{} {}: {}", stage, target, err))
        };

        let key = russh_keys::load_secret_key(&self.settings.key_path, None)
            .map_err(|e| unavailable("load key for", &e))?;

        let verifier = HostKeyVerifier {
            host: self.settings.host.clone(),
            port: self.settings.port,
            known_hosts: self.settings.known_hosts.clone(),
        };
        let mut handle = client::connect(
            Arc::clone(&self.ssh),
            (self.settings.host.as_str(), self.settings.port),
            verifier,
        )
        .await
        .map_err(|e| unavailable("connect to", &e))?;

        let accepted = handle
            .authenticate_publickey(self.settings.user.clone(), Arc::new(key))
            .await
            .map_err(|e| unavailable("authenticate to", &e))?;
        if !accepted {
            return Err(SourceError::Unavailable(format!(
                "authentication rejected by {}",
                target
            )));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| unavailable("open channel to", &e))?;
        channel
            .request_subsystem(true, "sftp")
            .await
            .map_err(|e| unavailable("start sftp on", &e))?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| unavailable("start sftp on", &e))?;

        Ok(Session {
            sftp,
            _ssh: handle,
        })
    }
}

/// One SSH connection with its SFTP subsystem
struct Session {
    sftp: SftpSession,
    _ssh: Handle<HostKeyVerifier>,
}

/// Accepts the server key listed in `known_hosts`, or any key without one
struct HostKeyVerifier {
    host: String,
    port: u16,
    known_hosts: Option<String>,
}

#[async_trait]
impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(&mut self, server_key: &PublicKey) -> Result<bool, Self::Error> {
        match &self.known_hosts {
            Some(path) => Ok(
                russh_keys::check_known_hosts_path(&self.host, self.port, server_key, path)
                    .unwrap_or(false),
            ),
            None => Ok(true),
        }
    }
}

/// Remote file plus the session it was opened on
struct SftpFileReader {
    file: ContentStream,
    _session: Session,
}

impl AsyncRead for SftpFileReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        self.get_mut().file.as_mut().poll_read(cx, buf)
    }
}

#[async_trait]
impl SnapshotDirectorySource for SftpSnapshotSource {
    async fn list_snapshot_identifiers(&self) -> SourceResult<Vec<String>> {
        let root = self.layout.snapshot_root().to_string();
        let session = self.connect().await?;
        let entries = session
            .sftp
            .read_dir(root.clone())
            .await
            .map_err(|e| map_sftp(&root, e))?;

        let mut ids: Vec<String> = entries
            .map(|entry| entry.file_name())
            .filter(|name| !name.starts_with('.'))
            .collect();
        ids.sort();
        Ok(ids)
    }

    async fn stat_mirrored_root(&self, snapshot_id: &str) -> SourceResult<EntryMeta> {
        let remote = self.layout.mirrored_root_path(snapshot_id);
        let session = self.connect().await?;
        let meta = session
            .sftp
            .metadata(remote.clone())
            .await
            .map_err(|e| map_sftp(&remote, e))?;

        Ok(EntryMeta {
            modified: modified_time(&meta),
            is_dir: meta.is_dir(),
        })
    }

    async fn stat_under_snapshot(
        &self,
        snapshot_id: &str,
        address: &ObjectAddress,
    ) -> SourceResult<ObjectMeta> {
        let remote = self.layout.snapshot_object_path(address, snapshot_id);
        let session = self.connect().await?;
        let meta = session
            .sftp
            .metadata(remote.clone())
            .await
            .map_err(|e| map_sftp(&remote, e))?;

        object_meta(&meta, &remote)
    }

    async fn open_stream_under_snapshot(
        &self,
        snapshot_id: &str,
        address: &ObjectAddress,
    ) -> SourceResult<ObjectStream> {
        let remote = self.layout.snapshot_object_path(address, snapshot_id);
        let session = self.connect().await?;
        let file = session
            .sftp
            .open(remote.clone())
            .await
            .map_err(|e| map_sftp(&remote, e))?;
        let meta = file.metadata().await.map_err(|e| map_sftp(&remote, e))?;
        let size = object_meta(&meta, &remote)?.size;

        let reader = SftpFileReader {
            file: Box::pin(file),
            _session: session,
        };
        Ok(ObjectStream::new(Box::pin(reader), Some(size)))
    }
}

/// A directory is a prefix, not an object
fn object_meta(meta: &Metadata, remote: &str) -> SourceResult<ObjectMeta> {
    if meta.is_dir() {
        return Err(SourceError::NotFound(remote.to_string()));
    }
    Ok(ObjectMeta {
        size: meta.size.unwrap_or(0),
        modified: modified_time(meta),
    })
}

fn modified_time(meta: &Metadata) -> DateTime<Utc> {
    meta.mtime
        .and_then(|secs| DateTime::<Utc>::from_timestamp(i64::from(secs), 0))
        .unwrap_or_default()
}

fn map_sftp(remote: &str, err: SftpError) -> SourceError {
    match err {
        SftpError::Status(status) => map_status(remote, status.status_code, &status.error_message),
        other => SourceError::Unavailable(format!("{}: {}", remote, other)),
    }
}

fn map_status(remote: &str, code: StatusCode, message: &str) -> SourceError {
    match code {
        StatusCode::NoSuchFile => SourceError::NotFound(remote.to_string()),
        other => SourceError::Unavailable(format!("{}: {:?} {}", remote, other, message)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(key_path: &str) -> SftpSettings {
        SftpSettings {
            host: "127.0.0.1".into(),
            port: 22,
            user: "snapview".into(),
            key_path: key_path.into(),
            known_hosts: None,
        }
    }

    #[test]
    fn test_no_such_file_is_not_found() {
        let err = map_status(".zfs/snapshot/x", StatusCode::NoSuchFile, "no such file");
        assert_eq!(err, SourceError::NotFound(".zfs/snapshot/x".into()));
    }

    #[test]
    fn test_other_statuses_are_unavailable() {
        for code in [StatusCode::PermissionDenied, StatusCode::Failure, StatusCode::ConnectionLost] {
            let err = map_status("p", code, "boom");
            assert!(matches!(err, SourceError::Unavailable(ref m) if m.contains("boom")));
        }
    }

    #[test]
    fn test_attribute_conversion() {
        let mut meta = Metadata::default();
        meta.size = Some(42);
        meta.mtime = Some(1_764_633_600);

        let object = object_meta(&meta, "p").unwrap();
        assert_eq!(object.size, 42);
        assert_eq!(object.modified.timestamp(), 1_764_633_600);

        meta.mtime = None;
        assert_eq!(modified_time(&meta).timestamp(), 0);
    }

    #[tokio::test]
    async fn test_unreadable_key_is_unavailable() {
        let source = SftpSnapshotSource::new(
            settings("/nonexistent/snapview_ed25519"),
            PathLayout::default(),
        );

        let result = source.list_snapshot_identifiers().await;
        assert!(matches!(result, Err(SourceError::Unavailable(ref m)) if m.contains("load key")));
    }
}
