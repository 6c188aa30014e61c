//! Per-query limits
//!
//! Every remote query carries its own timeout. An elapsed timeout turns into
//! `SourceError::Unavailable`; the caller decides whether that is a soft
//! failure (one snapshot) or fatal (the live check).

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::observability::{log_event_with_fields, Event, ResolverMetrics, Severity};
use crate::sources::{SourceError, SourceResult};

/// Tunables of the version resolver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolverOptions {
    /// Limit for one remote query
    pub query_timeout: Duration,
    /// Per-snapshot queries in flight at once
    pub max_concurrent_queries: usize,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            query_timeout: Duration::from_secs(10),
            max_concurrent_queries: 10,
        }
    }
}

/// Applies `ResolverOptions` to individual queries
#[derive(Debug, Clone)]
pub struct QueryPolicy {
    options: ResolverOptions,
    metrics: Arc<ResolverMetrics>,
}

impl QueryPolicy {
    pub fn new(options: ResolverOptions, metrics: Arc<ResolverMetrics>) -> Self {
        Self { options, metrics }
    }

    /// Fan-out width, never zero
    pub fn concurrency(&self) -> usize {
        self.options.max_concurrent_queries.max(1)
    }

    pub fn metrics(&self) -> &Arc<ResolverMetrics> {
        &self.metrics
    }

    /// Run one query under the per-query timeout
    pub async fn run<T, F>(&self, what: &str, query: F) -> SourceResult<T>
    where
        F: Future<Output = SourceResult<T>>,
    {
        match tokio::time::timeout(self.options.query_timeout, query).await {
            Ok(outcome) => outcome,
            Err(_) => {
                let limit = self.options.query_timeout.as_millis().to_string();
                self.metrics.increment_query_timeouts();
                log_event_with_fields(
                    Event::QueryTimeout,
                    Severity::Warn,
                    &[("query", what), ("timeout_ms", limit.as_str())],
                );
                Err(SourceError::Unavailable(format!(
                    "{}: timed out after {} ms",
                    what, limit
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(timeout_ms: u64) -> QueryPolicy {
        QueryPolicy::new(
            ResolverOptions {
                query_timeout: Duration::from_millis(timeout_ms),
                max_concurrent_queries: 0,
            },
            Arc::new(ResolverMetrics::new()),
        )
    }

    #[tokio::test]
    async fn test_fast_query_passes_through() {
        let p = policy(1_000);
        let outcome: SourceResult<u32> = p.run("fast", async { Ok(7) }).await;
        assert_eq!(outcome, Ok(7));

        let outcome: SourceResult<u32> = p
            .run("missing", async { Err(SourceError::NotFound("x".into())) })
            .await;
        assert_eq!(outcome, Err(SourceError::NotFound("x".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_becomes_unavailable() {
        let p = policy(50);
        let outcome: SourceResult<u32> = p
            .run("slow", async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            })
            .await;

        assert!(matches!(outcome, Err(SourceError::Unavailable(ref m)) if m.contains("timed out")));
        assert_eq!(p.metrics().snapshot().query_timeouts, 1);
    }

    #[test]
    fn test_concurrency_never_zero() {
        assert_eq!(policy(10).concurrency(), 1);
    }
}
