//! CLI command implementations
//!
//! Every command loads the configuration once, builds the sources it names
//! and runs on a fresh tokio runtime. Ctrl-C cancels whatever is in flight.
//! One-shot commands report failures as a JSON error line on stdout.

use std::future::Future;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, LiveBackend, SnapshotBackend};
use crate::http_server::HttpServer;
use crate::observability::{log_event, log_event_with_fields, Event, Logger, Severity};
use crate::sources::{
    ContainerEntry, LiveObjectSource, LocalLiveSource, LocalSnapshotSource, ObjectListing,
    S3LiveSource, SftpSnapshotSource, SnapshotDirectorySource,
};
use crate::versions::{
    CatalogScan, ContentHandle, ObjectAddress, ObjectPrefix, VersionError, VersionId,
    VersionListing, VersionResolver, VersionResult,
};

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{write_content, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    run_command(cli.command)
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    if !matches!(cmd, Command::Serve { .. }) {
        Logger::reserve_stdout();
    }

    match cmd {
        Command::Serve { config, port } => serve(&config, port),
        Command::Versions {
            config,
            container,
            path,
        } => versions(&config, &container, &path),
        Command::Snapshots { config } => snapshots(&config),
        Command::Ls {
            config,
            prefix,
            container,
        } => ls(&config, container.as_deref(), &prefix),
        Command::Cat {
            config,
            version,
            container,
            path,
        } => cat(&config, &container, &path, &version),
    }
}

/// Load configuration and apply its log level
fn load_config(config_path: &Path) -> CliResult<Config> {
    let config = Config::load(config_path)?;
    Logger::set_min_severity(config.min_severity());

    let path = config_path.display().to_string();
    log_event_with_fields(Event::ConfigLoaded, Severity::Info, &[("path", path.as_str())]);
    Ok(config)
}

fn runtime() -> CliResult<Runtime> {
    Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))
}

/// Build the resolver wired to the sources named by `config`
pub fn build_resolver(config: &Config) -> CliResult<VersionResolver> {
    let base = config.base_path().to_path_buf();
    let layout = config.layout();

    let live: Arc<dyn LiveObjectSource> = match config.live.backend {
        LiveBackend::Local => Arc::new(LocalLiveSource::new(base.clone(), layout.clone())),
        LiveBackend::S3 => {
            let settings = config
                .live
                .s3
                .as_ref()
                .ok_or_else(|| CliError::config_error("live.s3 settings missing"))?;
            Arc::new(S3LiveSource::new(settings))
        }
    };

    let snapshots: Arc<dyn SnapshotDirectorySource> = match config.storage.backend {
        SnapshotBackend::Local => Arc::new(LocalSnapshotSource::new(base, layout)),
        SnapshotBackend::Sftp => {
            let settings = config
                .storage
                .sftp
                .clone()
                .ok_or_else(|| CliError::config_error("storage.sftp settings missing"))?;
            Arc::new(SftpSnapshotSource::new(settings, layout))
        }
    };

    Ok(VersionResolver::new(live, snapshots, config.resolver_options()))
}

/// Cancel `token` on Ctrl-C; must be called inside the runtime
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_event(Event::ShutdownStart);
            token.cancel();
        }
    });
}

/// Run one resolver call on a fresh runtime, cancelled by Ctrl-C
fn run_query<T, F, Fut>(config: &Config, query: F) -> CliResult<T>
where
    F: FnOnce(VersionResolver, CancellationToken) -> Fut,
    Fut: Future<Output = VersionResult<T>>,
{
    let rt = runtime()?;
    rt.block_on(async {
        let resolver = build_resolver(config)?;
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());
        Ok::<_, CliError>(query(resolver, cancel).await?)
    })
}

/// Write the outcome of a JSON command; errors are written, then returned
fn respond<W: Write, T: Serialize>(out: &mut W, result: CliResult<T>) -> CliResult<()> {
    match result {
        Ok(data) => write_response(out, &data),
        Err(e) => {
            write_error(out, e.code_str(), e.message())?;
            Err(e)
        }
    }
}

/// Serve the HTTP API until Ctrl-C
pub fn serve(config_path: &Path, port: Option<u16>) -> CliResult<()> {
    let config = load_config(config_path)?;

    let mut http_config = config.http.clone();
    if let Some(port) = port {
        http_config.port = port;
    }

    let rt = runtime()?;
    rt.block_on(async {
        let resolver = build_resolver(&config)?;
        let shutdown = CancellationToken::new();
        cancel_on_ctrl_c(shutdown.clone());

        HttpServer::new(http_config, resolver, shutdown)
            .start()
            .await
            .map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
    })
}

/// Print the version history of one object
pub fn versions(config_path: &Path, container: &str, path: &str) -> CliResult<()> {
    respond(&mut io::stdout(), fetch_versions(config_path, container, path))
}

fn fetch_versions(config_path: &Path, container: &str, path: &str) -> CliResult<VersionListing> {
    let config = load_config(config_path)?;
    let address = ObjectAddress::new(container, path)?;
    run_query(&config, |resolver, cancel| async move {
        resolver.list_versions(&address, &cancel).await
    })
}

/// Print the snapshots that hold the mirrored root
pub fn snapshots(config_path: &Path) -> CliResult<()> {
    respond(&mut io::stdout(), fetch_snapshots(config_path))
}

fn fetch_snapshots(config_path: &Path) -> CliResult<CatalogScan> {
    let config = load_config(config_path)?;
    run_query(&config, |resolver, cancel| async move {
        resolver.list_snapshots(&cancel).await
    })
}

/// What `ls` prints
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum LsOutput {
    Containers {
        containers: Vec<ContainerEntry>,
    },
    Objects {
        #[serde(flatten)]
        prefix: ObjectPrefix,
        #[serde(flatten)]
        listing: ObjectListing,
    },
}

/// Print the containers, or one folder level of `container`
pub fn ls(config_path: &Path, container: Option<&str>, prefix: &str) -> CliResult<()> {
    respond(&mut io::stdout(), fetch_listing(config_path, container, prefix))
}

fn fetch_listing(config_path: &Path, container: Option<&str>, prefix: &str) -> CliResult<LsOutput> {
    let config = load_config(config_path)?;
    match container {
        None => run_query(&config, |resolver, cancel| async move {
            let containers = resolver.list_containers(&cancel).await?;
            Ok(LsOutput::Containers { containers })
        }),
        Some(container) => {
            let prefix = ObjectPrefix::new(container, prefix)?;
            run_query(&config, |resolver, cancel| async move {
                let listing = resolver.list_objects(&prefix, &cancel).await?;
                Ok(LsOutput::Objects { prefix, listing })
            })
        }
    }
}

/// Write one version of an object to stdout
///
/// Failures before the first byte are reported as a JSON error line.
pub fn cat(config_path: &Path, container: &str, path: &str, version: &str) -> CliResult<()> {
    let (rt, handle, cancel) = match open_content(config_path, container, path, version) {
        Ok(opened) => opened,
        Err(e) => {
            write_error(&mut io::stdout(), e.code_str(), e.message())?;
            return Err(e);
        }
    };

    rt.block_on(async {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CliError::from(VersionError::Cancelled)),
            written = write_content(handle) => written.map(|_| ()),
        }
    })
}

/// Resolve a version on a runtime that stays alive while it is streamed
fn open_content(
    config_path: &Path,
    container: &str,
    path: &str,
    version: &str,
) -> CliResult<(Runtime, ContentHandle, CancellationToken)> {
    let config = load_config(config_path)?;
    let address = ObjectAddress::new(container, path)?;
    let version = VersionId::parse(version)?;

    let rt = runtime()?;
    let (handle, cancel) = rt.block_on(async {
        let resolver = build_resolver(&config)?;
        let cancel = CancellationToken::new();
        cancel_on_ctrl_c(cancel.clone());

        let handle = resolver.resolve_content(&address, &version, &cancel).await?;
        Ok::<_, CliError>((handle, cancel))
    })?;
    Ok((rt, handle, cancel))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn local_config(base: &Path) -> Config {
        let json = serde_json::json!({ "storage": { "base_dir": base } });
        Config::from_json(&json.to_string()).unwrap()
    }

    /// Config file over a home holding one live object
    fn config_file(temp: &tempfile::TempDir) -> std::path::PathBuf {
        let object = temp.path().join("s3root/test-bucket/documents/document1.txt");
        fs::create_dir_all(object.parent().unwrap()).unwrap();
        fs::write(&object, "CURRENT version").unwrap();

        let path = temp.path().join("snapview.json");
        let json = serde_json::json!({ "storage": { "base_dir": temp.path() } });
        fs::write(&path, json.to_string()).unwrap();
        path
    }

    fn output_json(out: &[u8]) -> serde_json::Value {
        serde_json::from_slice(out).unwrap()
    }

    #[tokio::test]
    async fn test_build_local_resolver() {
        let temp = tempfile::TempDir::new().unwrap();
        let resolver = build_resolver(&local_config(temp.path())).unwrap();

        let scan = resolver
            .list_snapshots(&CancellationToken::new())
            .await
            .unwrap();
        assert!(scan.snapshots.is_empty());
    }

    #[test]
    fn test_s3_backend_without_settings_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = local_config(temp.path());
        config.live.backend = LiveBackend::S3;
        config.live.s3 = None;

        let err = build_resolver(&config).err().unwrap();
        assert_eq!(err.code_str(), "SNAPVIEW_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_sftp_backend_without_settings_fails() {
        let temp = tempfile::TempDir::new().unwrap();
        let mut config = local_config(temp.path());
        config.storage.backend = SnapshotBackend::Sftp;
        config.storage.sftp = None;

        let err = build_resolver(&config).err().unwrap();
        assert_eq!(err.code_str(), "SNAPVIEW_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_missing_config_file_is_reported() {
        let mut out = Vec::new();
        let err = respond(
            &mut out,
            fetch_versions(Path::new("/nonexistent/snapview.json"), "b", "k"),
        )
        .unwrap_err();

        assert_eq!(err.code_str(), "SNAPVIEW_CLI_CONFIG_ERROR");
        assert_eq!(output_json(&out)["code"], "SNAPVIEW_CLI_CONFIG_ERROR");
    }

    #[test]
    fn test_invalid_address_is_reported() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_file(&temp);

        let mut out = Vec::new();
        let err = respond(&mut out, fetch_versions(&config, "test-bucket", "../secret")).unwrap_err();

        assert_eq!(err.code_str(), "SNAPVIEW_CLI_INVALID_ARGUMENT");
        let json = output_json(&out);
        assert_eq!(json["status"], "error");
        assert_eq!(json["code"], "SNAPVIEW_CLI_INVALID_ARGUMENT");
    }

    #[test]
    fn test_open_content_rejects_bad_address() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_file(&temp);

        let err = open_content(&config, "test-bucket", "a//b", "current").err().unwrap();
        assert_eq!(err.code_str(), "SNAPVIEW_CLI_INVALID_ARGUMENT");
    }

    #[test]
    fn test_versions_from_config_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_file(&temp);

        let mut out = Vec::new();
        respond(
            &mut out,
            fetch_versions(&config, "test-bucket", "documents/document1.txt"),
        )
        .unwrap();

        let json = output_json(&out);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["data"]["versions"][0]["version_id"], "current");
    }

    #[test]
    fn test_ls_containers_and_objects() {
        let temp = tempfile::TempDir::new().unwrap();
        let config = config_file(&temp);

        let mut out = Vec::new();
        respond(&mut out, fetch_listing(&config, None, "")).unwrap();
        let json = output_json(&out);
        assert_eq!(json["data"]["containers"][0]["name"], "test-bucket");

        let mut out = Vec::new();
        respond(
            &mut out,
            fetch_listing(&config, Some("test-bucket"), "documents/"),
        )
        .unwrap();
        let json = output_json(&out);
        assert_eq!(json["data"]["container"], "test-bucket");
        assert_eq!(json["data"]["prefix"], "documents/");
        assert_eq!(json["data"]["objects"][0]["key"], "documents/document1.txt");
    }
}
