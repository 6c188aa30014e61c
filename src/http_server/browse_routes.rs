//! Browse HTTP Routes
//!
//! Walk the live tree to find an object before asking for its versions.
//!
//! - `GET /buckets` - containers of the live source
//! - `GET /b/:bucket?prefix=<p>` - one folder level below `prefix`
//! - `GET /b/:bucket/o/*path` - metadata of the live object

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use super::version_routes::{error_response, parse_address, ApiError, VersionState};
use crate::sources::{ContainerEntry, FolderEntry, ObjectEntry};
use crate::versions::ObjectPrefix;

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct BucketResponse {
    pub name: String,
    pub creation_date: Option<String>,
}

impl From<&ContainerEntry> for BucketResponse {
    fn from(entry: &ContainerEntry) -> Self {
        Self {
            name: entry.name.clone(),
            creation_date: entry.created.map(|t| t.to_rfc3339()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BucketsListResponse {
    pub buckets: Vec<BucketResponse>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct FolderResponse {
    pub name: String,
    pub prefix: String,
}

impl From<&FolderEntry> for FolderResponse {
    fn from(entry: &FolderEntry) -> Self {
        Self {
            name: entry.name.clone(),
            prefix: entry.prefix.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct FileResponse {
    pub name: String,
    pub key: String,
    pub size: u64,
    pub last_modified: String,
}

impl From<&ObjectEntry> for FileResponse {
    fn from(entry: &ObjectEntry) -> Self {
        Self {
            name: entry.name.clone(),
            key: entry.key.clone(),
            size: entry.size,
            last_modified: entry.modified.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ObjectsListResponse {
    pub bucket: String,
    pub prefix: String,
    pub folders: Vec<FolderResponse>,
    pub files: Vec<FileResponse>,
}

#[derive(Debug, Serialize)]
pub struct ObjectDetailResponse {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub last_modified: String,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub prefix: String,
}

// ==================
// Browse Routes
// ==================

/// Create browse routes
pub fn browse_routes(state: VersionState) -> Router {
    Router::new()
        .route("/buckets", get(list_buckets_handler))
        .route("/b/:bucket", get(list_objects_handler))
        .route("/b/:bucket/o/*path", get(object_detail_handler))
        .with_state(state)
}

// ==================
// Handlers
// ==================

async fn list_buckets_handler(
    State(state): State<VersionState>,
) -> Result<Json<BucketsListResponse>, ApiError> {
    let cancel = state.shutdown.child_token();
    let containers = state
        .resolver
        .list_containers(&cancel)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(BucketsListResponse {
        buckets: containers.iter().map(BucketResponse::from).collect(),
        total: containers.len(),
    }))
}

async fn list_objects_handler(
    State(state): State<VersionState>,
    Path(bucket): Path<String>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ObjectsListResponse>, ApiError> {
    let prefix = ObjectPrefix::new(bucket, query.prefix).map_err(|e| error_response(&e))?;
    let cancel = state.shutdown.child_token();

    let listing = state
        .resolver
        .list_objects(&prefix, &cancel)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(ObjectsListResponse {
        bucket: prefix.container().to_string(),
        prefix: prefix.prefix().to_string(),
        folders: listing.folders.iter().map(FolderResponse::from).collect(),
        files: listing.objects.iter().map(FileResponse::from).collect(),
    }))
}

async fn object_detail_handler(
    State(state): State<VersionState>,
    Path((bucket, path)): Path<(String, String)>,
) -> Result<Json<ObjectDetailResponse>, ApiError> {
    let address = parse_address(bucket, path)?;
    let cancel = state.shutdown.child_token();

    let record = state
        .resolver
        .describe_object(&address, &cancel)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(ObjectDetailResponse {
        bucket: address.container().to_string(),
        key: address.path().to_string(),
        size: record.size,
        last_modified: record.modified.to_rfc3339(),
    }))
}
