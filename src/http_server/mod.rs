//! # HTTP Server Module
//!
//! Read-only JSON API over the version resolver.
//!
//! # Endpoints
//!
//! - `/health` - Health check (never authenticated)
//! - `/api/buckets` - Containers of the live source
//! - `/api/b/:bucket?prefix=` - One folder level of a container
//! - `/api/b/:bucket/o/*path` - Live object metadata
//! - `/api/snapshots` - Valid snapshots
//! - `/api/versions/:container/*path` - Version history of an object
//! - `/api/content/:container/*path` - Bytes of one version
//! - `/observability/metrics` - Resolver counters

pub mod auth;
pub mod browse_routes;
pub mod config;
pub mod observability_routes;
pub mod server;
pub mod version_routes;

pub use auth::AuthState;
pub use config::{AuthConfig, AuthMode, HttpServerConfig};
pub use server::HttpServer;
pub use version_routes::{VersionState, VERSION_HEADER};
