//! Configuration file structure
//!
//! A single JSON document, loaded once at startup and injected into the
//! sources and the HTTP server. Optional fields carry serde defaults.
//!
//! ```json
//! {
//!   "storage": { "backend": "sftp", "sftp": { "host": "de1234.rsync.net",
//!                "user": "de1234", "key_path": "/etc/snapview/id_ed25519" } },
//!   "live": { "backend": "s3", "s3": { "endpoint": "http://s3-gateway:9000",
//!             "access_key": "...", "secret_key": "..." } },
//!   "http": { "port": 8080, "auth": { "mode": "basic", "username": "admin",
//!             "password": "..." } }
//! }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_server::{AuthMode, HttpServerConfig};
use crate::observability::Severity;
use crate::versions::{PathLayout, ResolverOptions};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Read(String),

    #[error("Invalid config JSON: {0}")]
    Parse(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub storage: StorageSettings,

    #[serde(default)]
    pub live: LiveSettings,

    #[serde(default)]
    pub resolver: ResolverSettings,

    #[serde(default)]
    pub http: HttpServerConfig,

    /// Minimum log severity: trace, info, warn or error (default: info)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Where the provider's storage home is reachable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageSettings {
    /// How the snapshot namespace is reached (default: local)
    #[serde(default)]
    pub backend: SnapshotBackend,

    /// Local path of the storage home; required by every local source
    #[serde(default)]
    pub base_dir: String,

    /// Required when `backend` is "sftp"
    #[serde(default)]
    pub sftp: Option<SftpSettings>,

    /// Snapshot namespace relative to the home (default: ".zfs/snapshot")
    #[serde(default = "default_snapshot_root")]
    pub snapshot_root: String,

    /// Directory mirrored between the live tree and each snapshot (default: "s3root")
    #[serde(default = "default_mirrored_root")]
    pub mirrored_root: String,
}

/// Which snapshot source to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotBackend {
    /// Read `<base_dir>/<snapshot_root>` through the filesystem
    #[default]
    Local,
    /// Read `<snapshot_root>` under the SFTP login directory
    Sftp,
}

/// SSH connection settings of the storage provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpSettings {
    pub host: String,

    #[serde(default = "default_ssh_port")]
    pub port: u16,

    pub user: String,

    /// Private key used for public key authentication
    pub key_path: String,

    /// OpenSSH known_hosts file; without one any host key is accepted
    #[serde(default)]
    pub known_hosts: Option<String>,
}

/// Which live source to use
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiveBackend {
    /// Read the mirrored root under `storage.base_dir`
    #[default]
    Local,
    /// Ask the S3 gateway
    S3,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveSettings {
    #[serde(default)]
    pub backend: LiveBackend,

    /// Required when `backend` is "s3"
    #[serde(default)]
    pub s3: Option<S3Settings>,
}

/// S3 gateway connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Settings {
    pub endpoint: String,

    #[serde(default = "default_region")]
    pub region: String,

    #[serde(default)]
    pub access_key: String,

    #[serde(default)]
    pub secret_key: String,
}

/// Resolver limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverSettings {
    /// Timeout of one remote query in milliseconds (default: 10000)
    #[serde(default = "default_query_timeout_ms")]
    pub query_timeout_ms: u64,

    /// Concurrent per-snapshot queries (default: 10)
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            query_timeout_ms: default_query_timeout_ms(),
            max_concurrent_queries: default_max_concurrent_queries(),
        }
    }
}

fn default_snapshot_root() -> String {
    ".zfs/snapshot".to_string()
}
fn default_mirrored_root() -> String {
    "s3root".to_string()
}
fn default_ssh_port() -> u16 {
    22
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_query_timeout_ms() -> u64 {
    10_000
}
fn default_max_concurrent_queries() -> usize {
    10
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&content)
    }

    /// Parse and validate a configuration document
    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: Config =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        let needs_base_dir = self.storage.backend == SnapshotBackend::Local
            || self.live.backend == LiveBackend::Local;
        if needs_base_dir && self.storage.base_dir.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.base_dir is required by the local backends".into(),
            ));
        }

        if self.storage.backend == SnapshotBackend::Sftp {
            match &self.storage.sftp {
                Some(sftp)
                    if !sftp.host.is_empty()
                        && !sftp.user.is_empty()
                        && !sftp.key_path.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(
                        "storage.sftp needs host, user and key_path for the sftp backend".into(),
                    ))
                }
            }
        }
        if self.storage.snapshot_root.trim_matches('/').is_empty() {
            return Err(ConfigError::Invalid(
                "storage.snapshot_root must not be empty".into(),
            ));
        }

        if self.live.backend == LiveBackend::S3 {
            match &self.live.s3 {
                Some(s3) if !s3.endpoint.is_empty() => {}
                _ => {
                    return Err(ConfigError::Invalid(
                        "live.s3.endpoint is required for the s3 backend".into(),
                    ))
                }
            }
        }

        if self.resolver.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("resolver.query_timeout_ms must be > 0".into()));
        }
        if self.resolver.max_concurrent_queries == 0 {
            return Err(ConfigError::Invalid(
                "resolver.max_concurrent_queries must be > 0".into(),
            ));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::Invalid(format!(
                "Invalid log_level: '{}'",
                self.log_level
            )));
        }

        if self.http.auth.mode == AuthMode::Basic
            && (self.http.auth.username.is_empty() || self.http.auth.password.is_empty())
        {
            return Err(ConfigError::Invalid(
                "http.auth basic mode needs username and password".into(),
            ));
        }

        Ok(())
    }

    /// Storage home as a path
    pub fn base_path(&self) -> &Path {
        Path::new(&self.storage.base_dir)
    }

    pub fn layout(&self) -> PathLayout {
        PathLayout::new(&self.storage.snapshot_root, &self.storage.mirrored_root)
    }

    pub fn resolver_options(&self) -> ResolverOptions {
        ResolverOptions {
            query_timeout: Duration::from_millis(self.resolver.query_timeout_ms),
            max_concurrent_queries: self.resolver.max_concurrent_queries,
        }
    }

    /// Validated log level
    pub fn min_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_json(r#"{"storage": {"base_dir": "/mnt/home"}}"#).unwrap();

        assert_eq!(config.storage.snapshot_root, ".zfs/snapshot");
        assert_eq!(config.storage.mirrored_root, "s3root");
        assert_eq!(config.live.backend, LiveBackend::Local);
        assert_eq!(config.resolver.query_timeout_ms, 10_000);
        assert_eq!(config.resolver.max_concurrent_queries, 10);
        assert_eq!(config.min_severity(), Severity::Info);
        assert_eq!(config.layout(), PathLayout::default());
        assert_eq!(
            config.resolver_options().query_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_s3_backend_requires_endpoint() {
        let result = Config::from_json(r#"{"storage": {"base_dir": "/m"}, "live": {"backend": "s3"}}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let config = Config::from_json(
            r#"{"storage": {"base_dir": "/m"},
                "live": {"backend": "s3", "s3": {"endpoint": "http://gw:9000"}}}"#,
        )
        .unwrap();
        assert_eq!(config.live.s3.unwrap().region, "us-east-1");
    }

    #[test]
    fn test_rejects_zero_limits() {
        let result = Config::from_json(
            r#"{"storage": {"base_dir": "/m"}, "resolver": {"query_timeout_ms": 0}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_json(
            r#"{"storage": {"base_dir": "/m"}, "resolver": {"max_concurrent_queries": 0}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        let result = Config::from_json(r#"{"storage": {"base_dir": "/m"}, "log_level": "loud"}"#);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_basic_auth_needs_credentials() {
        let result = Config::from_json(
            r#"{"storage": {"base_dir": "/m"}, "http": {"auth": {"mode": "basic"}}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_sftp_backend() {
        let config = Config::from_json(
            r#"{"storage": {"backend": "sftp",
                            "sftp": {"host": "de1234.rsync.net", "user": "de1234",
                                     "key_path": "/etc/snapview/id_ed25519"}},
                "live": {"backend": "s3", "s3": {"endpoint": "http://gw:9000"}}}"#,
        )
        .unwrap();

        assert_eq!(config.storage.backend, SnapshotBackend::Sftp);
        let sftp = config.storage.sftp.unwrap();
        assert_eq!(sftp.port, 22);
        assert!(sftp.known_hosts.is_none());
    }

    #[test]
    fn test_sftp_backend_requires_settings() {
        let result = Config::from_json(
            r#"{"storage": {"base_dir": "/m", "backend": "sftp"}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = Config::from_json(
            r#"{"storage": {"base_dir": "/m", "backend": "sftp",
                            "sftp": {"host": "h", "user": "", "key_path": "/k"}}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_local_backends_require_base_dir() {
        let result = Config::from_json(
            r#"{"storage": {"backend": "sftp",
                            "sftp": {"host": "h", "user": "u", "key_path": "/k"}}}"#,
        );
        assert!(matches!(result, Err(ConfigError::Invalid(ref m)) if m.contains("base_dir")));
    }

    #[test]
    fn test_missing_storage_is_parse_error() {
        assert!(matches!(Config::from_json("{}"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("snapview.json");
        fs::write(&path, r#"{"storage": {"base_dir": "/mnt/home"}, "log_level": "warn"}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.base_path(), Path::new("/mnt/home"));
        assert_eq!(config.min_severity(), Severity::Warn);

        let missing = Config::load(&temp.path().join("nope.json"));
        assert!(matches!(missing, Err(ConfigError::Read(_))));
    }
}
