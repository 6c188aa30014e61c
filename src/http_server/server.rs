//! # HTTP Server
//!
//! Combines the browse, version, observability and health routers behind
//! CORS and optional basic authentication.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{middleware, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use super::auth::{require_auth, AuthState};
use super::browse_routes::browse_routes;
use super::config::HttpServerConfig;
use super::observability_routes::{health_routes, observability_routes};
use super::version_routes::{version_routes, VersionState};
use crate::observability::{log_event, log_event_with_fields, Event, Severity};
use crate::versions::VersionResolver;

/// HTTP server for the version API
pub struct HttpServer {
    config: HttpServerConfig,
    router: Router,
    shutdown: CancellationToken,
}

impl HttpServer {
    /// Create a server; cancelling `shutdown` stops it and every in-flight resolution
    pub fn new(
        config: HttpServerConfig,
        resolver: VersionResolver,
        shutdown: CancellationToken,
    ) -> Self {
        let router = Self::build_router(&config, resolver, shutdown.clone());
        Self {
            config,
            router,
            shutdown,
        }
    }

    /// Build the combined router with all endpoints
    fn build_router(
        config: &HttpServerConfig,
        resolver: VersionResolver,
        shutdown: CancellationToken,
    ) -> Router {
        let auth = AuthState::new(config.auth.clone());
        let metrics = resolver.metrics();
        let version_state = VersionState::new(resolver, shutdown);

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let api = version_routes(version_state.clone()).merge(browse_routes(version_state));
        let mut protected = Router::new()
            .nest("/api", api)
            .nest("/observability", observability_routes(metrics));
        if auth.is_enabled() {
            protected =
                protected.layer(middleware::from_fn_with_state(Arc::new(auth), require_auth));
        }

        Router::new()
            .merge(health_routes())
            .merge(protected)
            .layer(cors)
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(self) -> Router {
        self.router
    }

    /// Serve until the shutdown token is cancelled
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self.config.socket_addr().parse().map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("Invalid socket address {}: {}", self.config.socket_addr(), e),
            )
        })?;

        let listener = TcpListener::bind(addr).await?;
        let bound = listener.local_addr()?.to_string();
        log_event_with_fields(Event::Serving, Severity::Info, &[("addr", bound.as_str())]);

        let shutdown = self.shutdown.clone();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        log_event(Event::ShutdownComplete);
        Ok(())
    }
}
