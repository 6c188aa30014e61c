//! snapview - version discovery for objects preserved in filesystem snapshots
//!
//! An S3-compatible object store keeps only the latest copy of each object.
//! The filesystem underneath takes periodic read-only snapshots that mirror
//! the object tree. This crate reconciles the two into a per-object version
//! history and serves the bytes of any listed version.

pub mod cli;
pub mod config;
pub mod http_server;
pub mod observability;
pub mod sources;
pub mod versions;
