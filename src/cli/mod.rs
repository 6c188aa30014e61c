//! CLI module for snapview
//!
//! Provides command-line interface for:
//! - serve: Run the HTTP version API
//! - versions: One-shot version listing
//! - snapshots: One-shot snapshot listing
//! - ls: Browse containers and folders of the live source
//! - cat: Write one version's bytes to stdout

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{build_resolver, cat, ls, run, run_command, serve, snapshots, versions};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_content, write_error, write_response};
