//! Resolver metrics
//!
//! - Counters only, monotonic
//! - Reset only on process start
//! - Relaxed atomics; exact values are not required across threads

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters of the version resolver
#[derive(Debug, Default)]
pub struct ResolverMetrics {
    listings_served: AtomicU64,
    listings_failed: AtomicU64,
    contents_resolved: AtomicU64,
    contents_failed: AtomicU64,
    snapshots_skipped: AtomicU64,
    query_timeouts: AtomicU64,
    cancellations: AtomicU64,
}

impl ResolverMetrics {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_listings_served(&self) {
        self.listings_served.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_listings_failed(&self) {
        self.listings_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_contents_resolved(&self) {
        self.contents_resolved.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_contents_failed(&self) {
        self.contents_failed.fetch_add(1, Ordering::Relaxed);
    }

    /// Count snapshots left out of a listing after a soft failure
    pub fn add_snapshots_skipped(&self, count: u64) {
        self.snapshots_skipped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn increment_query_timeouts(&self) {
        self.query_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_cancellations(&self) {
        self.cancellations.fetch_add(1, Ordering::Relaxed);
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            listings_served: self.listings_served.load(Ordering::Relaxed),
            listings_failed: self.listings_failed.load(Ordering::Relaxed),
            contents_resolved: self.contents_resolved.load(Ordering::Relaxed),
            contents_failed: self.contents_failed.load(Ordering::Relaxed),
            snapshots_skipped: self.snapshots_skipped.load(Ordering::Relaxed),
            query_timeouts: self.query_timeouts.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of all counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub listings_served: u64,
    pub listings_failed: u64,
    pub contents_resolved: u64,
    pub contents_failed: u64,
    pub snapshots_skipped: u64,
    pub query_timeouts: u64,
    pub cancellations: u64,
}
