//! CLI argument definitions using clap
//!
//! Commands:
//! - snapview serve --config <path> [--port <port>]
//! - snapview versions --config <path> <container> <path>
//! - snapview snapshots --config <path>
//! - snapview ls --config <path> [--prefix <p>] [container]
//! - snapview cat --config <path> [--version <id>] <container> <path>

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::versions::CURRENT_VERSION;

/// snapview - browse object versions preserved in filesystem snapshots
#[derive(Parser, Debug)]
#[command(name = "snapview")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the version API over HTTP
    Serve {
        /// Path to configuration file
        #[arg(long, default_value = "./snapview.json")]
        config: PathBuf,

        /// Override the configured HTTP port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the version history of an object as JSON
    Versions {
        /// Path to configuration file
        #[arg(long, default_value = "./snapview.json")]
        config: PathBuf,

        /// Bucket holding the object
        container: String,

        /// Object key within the bucket
        path: String,
    },

    /// Print the valid snapshots as JSON
    Snapshots {
        /// Path to configuration file
        #[arg(long, default_value = "./snapview.json")]
        config: PathBuf,
    },

    /// List containers, or one folder level of a container, as JSON
    Ls {
        /// Path to configuration file
        #[arg(long, default_value = "./snapview.json")]
        config: PathBuf,

        /// Key prefix to list below; a trailing "/" lists a folder
        #[arg(long, default_value = "")]
        prefix: String,

        /// Bucket to list; omitted lists the buckets
        container: Option<String>,
    },

    /// Write the bytes of one version to stdout
    Cat {
        /// Path to configuration file
        #[arg(long, default_value = "./snapview.json")]
        config: PathBuf,

        /// "current" or a snapshot id
        #[arg(long, default_value = CURRENT_VERSION)]
        version: String,

        /// Bucket holding the object
        container: String,

        /// Object key within the bucket
        path: String,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
