//! Lifecycle events
//!
//! Events are explicit and typed; per-request events are logged through
//! `ObservationScope` instead.

use std::fmt;

/// Process lifecycle and resolver events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// Configuration loaded and validated
    ConfigLoaded,
    /// HTTP server bound and serving
    Serving,
    /// Shutdown initiated
    ShutdownStart,
    /// Shutdown complete
    ShutdownComplete,
    /// Snapshot namespace is missing entirely
    SnapshotRootMissing,
    /// Snapshot entry without a mirrored root, excluded
    SnapshotExcluded,
    /// Snapshot check failed softly, left out of a listing
    SnapshotSkipped,
    /// A single remote query exceeded its timeout
    QueryTimeout,
    /// Request rejected by authentication
    AuthRejected,
    /// SFTP source configured without a known_hosts file
    HostKeyUnchecked,
}

impl Event {
    /// Returns the event name
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::ConfigLoaded => "CONFIG_LOADED",
            Event::Serving => "SERVING",
            Event::ShutdownStart => "SHUTDOWN_START",
            Event::ShutdownComplete => "SHUTDOWN_COMPLETE",
            Event::SnapshotRootMissing => "SNAPSHOT_ROOT_MISSING",
            Event::SnapshotExcluded => "SNAPSHOT_EXCLUDED",
            Event::SnapshotSkipped => "SNAPSHOT_SKIPPED",
            Event::QueryTimeout => "QUERY_TIMEOUT",
            Event::AuthRejected => "AUTH_REJECTED",
            Event::HostKeyUnchecked => "HOST_KEY_UNCHECKED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
