//! # S3 Gateway Live Source
//!
//! Reads current objects through the S3 gateway that fronts the storage
//! provider. Containers map to buckets, object paths to keys. Listings use
//! `/` as the delimiter, so one call returns one folder level.

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::DateTime as S3DateTime;
use aws_sdk_s3::Client;
use chrono::{DateTime, Utc};

use super::backend::{
    ContainerEntry, FolderEntry, LiveObjectSource, ObjectEntry, ObjectListing, ObjectMeta,
    ObjectStream,
};
use super::errors::{SourceError, SourceResult};
use crate::config::S3Settings;
use crate::versions::{ObjectAddress, ObjectPrefix};

/// Live source backed by an S3-compatible endpoint
#[derive(Debug, Clone)]
pub struct S3LiveSource {
    client: Client,
}

impl S3LiveSource {
    /// Build a client with static credentials and path-style addressing
    pub fn new(settings: &S3Settings) -> Self {
        let credentials = Credentials::new(
            settings.access_key.clone(),
            settings.secret_key.clone(),
            None,
            None,
            "snapview",
        );

        let conf = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(settings.region.clone()))
            .endpoint_url(settings.endpoint.clone())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(conf),
        }
    }
}

#[async_trait]
impl LiveObjectSource for S3LiveSource {
    async fn head_object(&self, address: &ObjectAddress) -> SourceResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(address.container())
            .key(address.path())
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_not_found()).unwrap_or(false) {
                    SourceError::NotFound(address.to_string())
                } else {
                    SourceError::Unavailable(format!("{}: {}", address, DisplayErrorContext(&e)))
                }
            })?;

        let modified = output
            .last_modified()
            .and_then(to_chrono)
            .ok_or_else(|| {
                SourceError::Unavailable(format!("{}: missing last-modified", address))
            })?;

        Ok(ObjectMeta {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            modified,
        })
    }

    async fn open_object_stream(&self, address: &ObjectAddress) -> SourceResult<ObjectStream> {
        let output = self
            .client
            .get_object()
            .bucket(address.container())
            .key(address.path())
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_key()).unwrap_or(false) {
                    SourceError::NotFound(address.to_string())
                } else {
                    SourceError::Unavailable(format!("{}: {}", address, DisplayErrorContext(&e)))
                }
            })?;

        let size = output
            .content_length()
            .filter(|len| *len >= 0)
            .map(|len| len as u64);
        Ok(ObjectStream::new(Box::pin(output.body.into_async_read()), size))
    }

    async fn list_containers(&self) -> SourceResult<Vec<ContainerEntry>> {
        let output = self.client.list_buckets().send().await.map_err(|e| {
            SourceError::Unavailable(format!("list buckets: {}", DisplayErrorContext(&e)))
        })?;

        let mut containers: Vec<ContainerEntry> = output
            .buckets()
            .iter()
            .filter_map(|bucket| {
                Some(ContainerEntry {
                    name: bucket.name()?.to_string(),
                    created: bucket.creation_date().and_then(to_chrono),
                })
            })
            .collect();

        containers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(containers)
    }

    async fn list_objects(&self, prefix: &ObjectPrefix) -> SourceResult<ObjectListing> {
        let mut listing = ObjectListing::default();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(prefix.container())
                .delimiter("/");
            if !prefix.prefix().is_empty() {
                request = request.prefix(prefix.prefix());
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let output = request.send().await.map_err(|e| {
                if e.as_service_error().map(|s| s.is_no_such_bucket()).unwrap_or(false) {
                    SourceError::NotFound(prefix.container().to_string())
                } else {
                    SourceError::Unavailable(format!(
                        "list {}: {}",
                        prefix.container(),
                        DisplayErrorContext(&e)
                    ))
                }
            })?;

            for common in output.common_prefixes() {
                if let Some(folder) = common.prefix() {
                    listing.folders.push(FolderEntry {
                        name: last_segment(folder.trim_end_matches('/')).to_string(),
                        prefix: folder.to_string(),
                    });
                }
            }

            for object in output.contents() {
                let Some(key) = object.key() else {
                    continue;
                };
                let name = last_segment(key);
                // Folder markers: the prefix itself, or keys ending in `/`
                if key == prefix.prefix() || name.is_empty() {
                    continue;
                }
                listing.objects.push(ObjectEntry {
                    name: name.to_string(),
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    modified: object
                        .last_modified()
                        .and_then(to_chrono)
                        .unwrap_or_default(),
                });
            }

            match output.next_continuation_token() {
                Some(token) if output.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string());
                }
                _ => break,
            }
        }

        Ok(listing.sorted())
    }
}

fn last_segment(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}

fn to_chrono(ts: &S3DateTime) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts.secs(), ts.subsec_nanos())
}
