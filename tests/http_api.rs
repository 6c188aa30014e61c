//! HTTP API Tests
//!
//! Requests against the full router over an on-disk storage home.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde_json::Value;
use snapview::http_server::{AuthMode, HttpServer, HttpServerConfig, VERSION_HEADER};
use snapview::sources::{
    ContainerEntry, LiveObjectSource, LocalLiveSource, LocalSnapshotSource, ObjectListing,
    ObjectMeta, ObjectStream, SourceResult,
};
use snapview::versions::{ObjectAddress, ObjectPrefix, PathLayout, ResolverOptions, VersionResolver};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

fn create_home() -> TempDir {
    let temp = TempDir::new().unwrap();
    let live = temp.path().join("s3root/test-bucket/documents/document1.txt");
    let old = temp
        .path()
        .join(".zfs/snapshot/daily_2025-12-01/s3root/test-bucket/documents/document1.txt");
    for (path, data) in [(live, "CURRENT version"), (old, "YESTERDAY's version")] {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, data).unwrap();
    }
    temp
}

fn router(home: &Path, config: HttpServerConfig) -> Router {
    let live = LocalLiveSource::new(home.to_path_buf(), PathLayout::default());
    router_over(Arc::new(live), home, config)
}

fn router_over(live: Arc<dyn LiveObjectSource>, home: &Path, config: HttpServerConfig) -> Router {
    let snapshots = LocalSnapshotSource::new(home.to_path_buf(), PathLayout::default());
    let resolver = VersionResolver::new(live, Arc::new(snapshots), ResolverOptions::default());
    HttpServer::new(config, resolver, CancellationToken::new()).router()
}

/// Live source whose streams do not report a length, like a chunked gateway response
struct UnsizedLive(LocalLiveSource);

#[async_trait]
impl LiveObjectSource for UnsizedLive {
    async fn head_object(&self, address: &ObjectAddress) -> SourceResult<ObjectMeta> {
        self.0.head_object(address).await
    }

    async fn open_object_stream(&self, address: &ObjectAddress) -> SourceResult<ObjectStream> {
        let opened = self.0.open_object_stream(address).await?;
        Ok(ObjectStream::new(opened.reader, None))
    }

    async fn list_containers(&self) -> SourceResult<Vec<ContainerEntry>> {
        self.0.list_containers().await
    }

    async fn list_objects(&self, prefix: &ObjectPrefix) -> SourceResult<ObjectListing> {
        self.0.list_objects(prefix).await
    }
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = router
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, body.to_vec())
}

#[tokio::test]
async fn test_list_versions_endpoint() {
    let home = create_home();
    let (status, _, body) = get(
        router(home.path(), HttpServerConfig::default()),
        "/api/versions/test-bucket/documents/document1.txt",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["container"], "test-bucket");
    assert_eq!(json["path"], "documents/document1.txt");
    assert_eq!(json["total"], 2);
    assert_eq!(json["complete"], true);
    assert_eq!(json["versions"][0]["version_id"], "current");
    assert_eq!(json["versions"][0]["origin"], "live");
    assert_eq!(json["versions"][1]["version_id"], "daily_2025-12-01");
}

#[tokio::test]
async fn test_content_endpoint_serves_snapshot_bytes() {
    let home = create_home();
    let (status, headers, body) = get(
        router(home.path(), HttpServerConfig::default()),
        "/api/content/test-bucket/documents/document1.txt?version=daily_2025-12-01",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"YESTERDAY's version");
    assert_eq!(headers[VERSION_HEADER], "daily_2025-12-01");
    assert_eq!(headers[header::CONTENT_LENGTH], "19");
    assert!(headers.contains_key(header::LAST_MODIFIED));
}

#[tokio::test]
async fn test_content_defaults_to_current() {
    let home = create_home();
    let (status, headers, body) = get(
        router(home.path(), HttpServerConfig::default()),
        "/api/content/test-bucket/documents/document1.txt",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"CURRENT version");
    assert_eq!(headers[VERSION_HEADER], "current");
}

#[tokio::test]
async fn test_unknown_length_omits_content_length() {
    let home = create_home();
    let live = UnsizedLive(LocalLiveSource::new(home.path().to_path_buf(), PathLayout::default()));
    let (status, headers, body) = get(
        router_over(Arc::new(live), home.path(), HttpServerConfig::default()),
        "/api/content/test-bucket/documents/document1.txt",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert!(!headers.contains_key(header::CONTENT_LENGTH));
    assert_eq!(body, b"CURRENT version");
}

#[tokio::test]
async fn test_error_statuses() {
    let home = create_home();
    let app = router(home.path(), HttpServerConfig::default());

    let (status, _, body) = get(app.clone(), "/api/versions/test-bucket/missing.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], 404);

    let (status, _, _) = get(
        app.clone(),
        "/api/content/test-bucket/documents/document1.txt?version=weekly_1999-01",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(app, "/api/versions/test-bucket/documents/../secret").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_snapshots_and_metrics_endpoints() {
    let home = create_home();
    let app = router(home.path(), HttpServerConfig::default());

    let (status, _, body) = get(app.clone(), "/api/snapshots").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["snapshots"][0]["id"], "daily_2025-12-01");

    let (status, _, body) = get(app, "/observability/metrics").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["listings_served"], 0);
}

#[tokio::test]
async fn test_basic_auth_guards_api() {
    let home = create_home();
    let mut config = HttpServerConfig::default();
    config.auth.mode = AuthMode::Basic;
    config.auth.username = "admin".to_string();
    config.auth.password = "secret".to_string();
    let app = router(home.path(), config);

    let (status, headers, _) = get(app.clone(), "/api/snapshots").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(headers.contains_key(header::WWW_AUTHENTICATE));

    let request = Request::get("/api/snapshots")
        .header(
            header::AUTHORIZATION,
            format!("Basic {}", STANDARD.encode("admin:secret")),
        )
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, _, _) = get(app, "/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_buckets_endpoint() {
    let home = create_home();
    fs::create_dir_all(home.path().join("s3root/archive")).unwrap();

    let (status, _, body) = get(router(home.path(), HttpServerConfig::default()), "/api/buckets").await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["total"], 2);
    assert_eq!(json["buckets"][0]["name"], "archive");
    assert_eq!(json["buckets"][1]["name"], "test-bucket");
}

#[tokio::test]
async fn test_bucket_listing_splits_folders_and_files() {
    let home = create_home();
    let drafts = home.path().join("s3root/test-bucket/documents/drafts");
    fs::create_dir_all(&drafts).unwrap();
    fs::write(drafts.join("plan.md"), "draft").unwrap();
    fs::write(home.path().join("s3root/test-bucket/readme.txt"), "hello").unwrap();
    let app = router(home.path(), HttpServerConfig::default());

    let (status, _, body) = get(app.clone(), "/api/b/test-bucket").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["bucket"], "test-bucket");
    assert_eq!(json["prefix"], "");
    assert_eq!(json["folders"][0]["prefix"], "documents/");
    assert_eq!(json["files"][0]["key"], "readme.txt");

    let (status, _, body) = get(app, "/api/b/test-bucket?prefix=documents/").await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["prefix"], "documents/");
    assert_eq!(json["folders"][0]["name"], "drafts");
    assert_eq!(json["folders"][0]["prefix"], "documents/drafts/");
    assert_eq!(json["files"][0]["name"], "document1.txt");
    assert_eq!(json["files"][0]["key"], "documents/document1.txt");
    assert_eq!(json["files"][0]["size"], 15);
}

#[tokio::test]
async fn test_object_detail_endpoint() {
    let home = create_home();
    let (status, _, body) = get(
        router(home.path(), HttpServerConfig::default()),
        "/api/b/test-bucket/o/documents/document1.txt",
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["bucket"], "test-bucket");
    assert_eq!(json["key"], "documents/document1.txt");
    assert_eq!(json["size"], 15);
    assert!(json["last_modified"].is_string());
}

#[tokio::test]
async fn test_browse_error_statuses() {
    let home = create_home();
    let app = router(home.path(), HttpServerConfig::default());

    let (status, _, _) = get(app.clone(), "/api/b/no-such-bucket").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _, _) = get(app.clone(), "/api/b/test-bucket?prefix=documents/../").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(app.clone(), "/api/b/test-bucket/o/documents/missing.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Snapshot-only copies are not part of the live tree
    fs::remove_file(home.path().join("s3root/test-bucket/documents/document1.txt")).unwrap();
    let (status, _, _) = get(app, "/api/b/test-bucket/o/documents/document1.txt").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
