//! Version HTTP Routes
//!
//! Read-only endpoints over the version resolver.
//!
//! - `GET /snapshots` - valid snapshots, newest first
//! - `GET /versions/:container/*path` - version history of one object
//! - `GET /content/:container/*path?version=<id>` - bytes of one version

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::versions::{
    CatalogScan, ObjectAddress, SnapshotDescriptor, VersionError, VersionId, VersionListing,
    VersionOrigin, VersionRecord, VersionResolver, CURRENT_VERSION,
};

/// Header carrying the id of the version being served
pub const VERSION_HEADER: &str = "x-snapview-version";

// ==================
// Shared State
// ==================

/// State shared across version handlers
#[derive(Clone)]
pub struct VersionState {
    pub resolver: VersionResolver,
    /// Cancelled when the server shuts down
    pub shutdown: CancellationToken,
}

impl VersionState {
    pub fn new(resolver: VersionResolver, shutdown: CancellationToken) -> Self {
        Self { resolver, shutdown }
    }
}

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize)]
pub struct VersionResponse {
    pub version_id: String,
    pub origin: String,
    pub size: u64,
    pub modified: String,
    pub is_current: bool,
}

impl From<&VersionRecord> for VersionResponse {
    fn from(record: &VersionRecord) -> Self {
        Self {
            version_id: record.version_id.to_string(),
            origin: match record.origin {
                VersionOrigin::Live => "live".to_string(),
                VersionOrigin::Snapshot => "snapshot".to_string(),
            },
            size: record.size,
            modified: record.modified.to_rfc3339(),
            is_current: record.is_current,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct VersionsListResponse {
    pub container: String,
    pub path: String,
    pub versions: Vec<VersionResponse>,
    pub total: usize,
    pub skipped_snapshots: Vec<String>,
    pub complete: bool,
}

impl From<&VersionListing> for VersionsListResponse {
    fn from(listing: &VersionListing) -> Self {
        Self {
            container: listing.address.container().to_string(),
            path: listing.address.path().to_string(),
            versions: listing.versions.iter().map(VersionResponse::from).collect(),
            total: listing.versions.len(),
            skipped_snapshots: listing.skipped_snapshots.clone(),
            complete: listing.is_complete(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotResponse {
    pub id: String,
    pub timestamp: Option<String>,
    pub root_modified: String,
}

impl From<&SnapshotDescriptor> for SnapshotResponse {
    fn from(snapshot: &SnapshotDescriptor) -> Self {
        Self {
            id: snapshot.id.clone(),
            timestamp: snapshot.timestamp.map(|t| t.to_rfc3339()),
            root_modified: snapshot.root_modified.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnapshotsListResponse {
    pub snapshots: Vec<SnapshotResponse>,
    pub total: usize,
    pub unavailable: Vec<String>,
}

impl From<&CatalogScan> for SnapshotsListResponse {
    fn from(scan: &CatalogScan) -> Self {
        Self {
            snapshots: scan.snapshots.iter().map(SnapshotResponse::from).collect(),
            total: scan.snapshots.len(),
            unavailable: scan.unavailable.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ContentQuery {
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
}

pub(super) type ApiError = (StatusCode, Json<ErrorResponse>);

pub(super) fn error_response(err: &VersionError) -> ApiError {
    let code = err.status_code();
    let status = StatusCode::from_u16(code).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
            code,
        }),
    )
}

// ==================
// Version Routes
// ==================

/// Create version routes
pub fn version_routes(state: VersionState) -> Router {
    Router::new()
        .route("/snapshots", get(list_snapshots_handler))
        .route("/versions/:container/*path", get(list_versions_handler))
        .route("/content/:container/*path", get(content_handler))
        .with_state(state)
}

// ==================
// Helper Functions
// ==================

pub(super) fn parse_address(container: String, path: String) -> Result<ObjectAddress, ApiError> {
    let path = path.trim_start_matches('/').to_string();
    ObjectAddress::new(container, path).map_err(|e| error_response(&e))
}

/// RFC 7231 date for `Last-Modified`
fn http_date(time: &DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

// ==================
// Handlers
// ==================

async fn list_snapshots_handler(
    State(state): State<VersionState>,
) -> Result<Json<SnapshotsListResponse>, ApiError> {
    let cancel = state.shutdown.child_token();
    let scan = state
        .resolver
        .list_snapshots(&cancel)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(SnapshotsListResponse::from(&scan)))
}

async fn list_versions_handler(
    State(state): State<VersionState>,
    Path((container, path)): Path<(String, String)>,
) -> Result<Json<VersionsListResponse>, ApiError> {
    let address = parse_address(container, path)?;
    let cancel = state.shutdown.child_token();

    let listing = state
        .resolver
        .list_versions(&address, &cancel)
        .await
        .map_err(|e| error_response(&e))?;

    Ok(Json(VersionsListResponse::from(&listing)))
}

async fn content_handler(
    State(state): State<VersionState>,
    Path((container, path)): Path<(String, String)>,
    Query(query): Query<ContentQuery>,
) -> Result<Response, ApiError> {
    let address = parse_address(container, path)?;
    let version = VersionId::parse(query.version.as_deref().unwrap_or(CURRENT_VERSION))
        .map_err(|e| error_response(&e))?;
    let cancel = state.shutdown.child_token();

    let handle = state
        .resolver
        .resolve_content(&address, &version, &cancel)
        .await
        .map_err(|e| error_response(&e))?;

    let record = handle.record().clone();
    let content_length = handle.content_length();
    let disposition = format!("attachment; filename=\"{}\"", address.file_name().replace('"', ""));

    let mut response = Body::from_stream(ReaderStream::new(handle)).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    // Only the opened handle knows how many bytes the body will carry
    if let Some(len) = content_length {
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }
    if let Ok(value) = HeaderValue::from_str(&http_date(&record.modified)) {
        headers.insert(header::LAST_MODIFIED, value);
    }
    if let Ok(value) = HeaderValue::from_str(record.version_id.as_str()) {
        headers.insert(VERSION_HEADER, value);
    }
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }

    Ok(response)
}
