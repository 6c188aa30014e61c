//! Observability subsystem
//!
//! - Structured logging (JSON, one line per event)
//! - Monotonic resolver counters
//! - Scope-based operation tracing
//!
//! # Usage
//!
//! ```ignore
//! use snapview::observability::{log_event_with_fields, Event, Logger, ObservationScope};
//!
//! Logger::info("CONFIG_LOADED", &[("path", "snapview.json")]);
//! log_event_with_fields(Event::SnapshotSkipped, Severity::Warn, &[("snapshot", id)]);
//!
//! let scope = ObservationScope::with_fields("LIST_VERSIONS", &[("address", &addr)]);
//! // ... do work ...
//! scope.complete();
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsSnapshot, ResolverMetrics};
pub use scope::{ObservationScope, Timer};

/// Log a lifecycle event
pub fn log_event(event: Event) {
    Logger::info(event.as_str(), &[]);
}

/// Log an event with fields at the given severity
pub fn log_event_with_fields(event: Event, severity: Severity, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_event() {
        log_event(Event::Serving);
        log_event_with_fields(
            Event::SnapshotSkipped,
            Severity::Warn,
            &[("snapshot", "daily_2025-12-01")],
        );
    }
}
