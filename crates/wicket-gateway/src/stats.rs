//! Request statistics: running totals plus a bounded ring of recent
//! requests, feeding the dashboard aggregates.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use regex::Regex;
use serde::Serialize;
use tower::Service;
use wicket_core::{GatewayRequest, GatewayResponse};

use crate::error::GatewayError;

const RECENT_CAPACITY: usize = 100;

/// One observed request.
#[derive(Debug, Clone, Serialize)]
pub struct RequestRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub status: u16,
    pub response_time_ms: f64,
    pub cache_hit: bool,
}

#[derive(Default)]
struct StatsInner {
    total_requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    rate_limited_requests: u64,
    total_response_time_ms: f64,
    recent: VecDeque<RequestRecord>,
}

/// Aggregated view served by the dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub rate_limited_requests: u64,
    /// Percentage, one decimal.
    pub cache_hit_rate: f64,
    /// Milliseconds, one decimal.
    pub avg_response_time_ms: f64,
    pub recent_requests: Vec<RequestRecord>,
}

/// Thread-safe request statistics recorder.
#[derive(Default)]
pub struct StatsRecorder {
    inner: Mutex<StatsInner>,
}

impl StatsRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one request outcome. Wall-clock time is permitted here and
    /// nowhere else in the request path.
    pub fn record(
        &self,
        method: &str,
        path: &str,
        status: u16,
        response_time_ms: f64,
        cache_hit: bool,
    ) {
        let mut inner = self.inner.lock().expect("stats lock poisoned");
        inner.total_requests += 1;
        inner.total_response_time_ms += response_time_ms;
        if cache_hit {
            inner.cache_hits += 1;
        } else {
            inner.cache_misses += 1;
        }
        if status == 429 {
            inner.rate_limited_requests += 1;
        }

        inner.recent.push_back(RequestRecord {
            timestamp: Utc::now(),
            method: method.to_string(),
            path: path.to_string(),
            status,
            response_time_ms,
            cache_hit,
        });
        while inner.recent.len() > RECENT_CAPACITY {
            inner.recent.pop_front();
        }
    }

    /// A consistent snapshot of the aggregates and the recent ring.
    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.inner.lock().expect("stats lock poisoned");
        let cache_lookups = inner.cache_hits + inner.cache_misses;
        let cache_hit_rate = if cache_lookups == 0 {
            0.0
        } else {
            round1(inner.cache_hits as f64 / cache_lookups as f64 * 100.0)
        };
        let avg_response_time_ms = if inner.total_requests == 0 {
            0.0
        } else {
            round1(inner.total_response_time_ms / inner.total_requests as f64)
        };

        StatsSnapshot {
            total_requests: inner.total_requests,
            cache_hits: inner.cache_hits,
            cache_misses: inner.cache_misses,
            rate_limited_requests: inner.rate_limited_requests,
            cache_hit_rate,
            avg_response_time_ms,
            recent_requests: inner.recent.iter().cloned().collect(),
        }
    }

    /// Approximate per-pattern request count, derived from the ring.
    pub fn recent_matching(&self, pattern: &Regex) -> usize {
        let inner = self.inner.lock().expect("stats lock poisoned");
        inner
            .recent
            .iter()
            .filter(|record| pattern.is_match(&record.path))
            .count()
    }
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Outermost chain layer: observes every request's start and end,
/// including error outcomes, which it maps to their response status.
pub(crate) struct StatsService<S> {
    inner: S,
    stats: std::sync::Arc<StatsRecorder>,
}

impl<S> StatsService<S> {
    pub(crate) fn new(inner: S, stats: std::sync::Arc<StatsRecorder>) -> Self {
        Self { inner, stats }
    }
}

impl<S: Clone> Clone for StatsService<S> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            stats: std::sync::Arc::clone(&self.stats),
        }
    }
}

impl<S> Service<GatewayRequest> for StatsService<S>
where
    S: Service<GatewayRequest, Response = GatewayResponse, Error = GatewayError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = GatewayResponse;
    type Error = GatewayError;
    type Future = BoxFuture<'static, Result<GatewayResponse, GatewayError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: GatewayRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let stats = std::sync::Arc::clone(&self.stats);
        let method = req.method.to_string();
        let path = req.path().to_string();

        Box::pin(async move {
            let start = Instant::now();
            let result = inner.call(req).await;
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let (status, cache_hit) = match &result {
                Ok(response) => (response.status.as_u16(), response.cache_hit),
                Err(error) => (error.status().as_u16(), false),
            };
            stats.record(&method, &path, status, elapsed_ms, cache_hit);
            result
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn totals_and_aggregates() {
        let stats = StatsRecorder::new();
        stats.record("GET", "/a", 200, 10.0, false);
        stats.record("GET", "/a", 200, 20.0, true);
        stats.record("GET", "/b", 429, 0.0, false);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.total_requests, 3);
        assert_eq!(snapshot.cache_hits, 1);
        assert_eq!(snapshot.cache_misses, 2);
        assert_eq!(snapshot.rate_limited_requests, 1);
        assert_eq!(snapshot.cache_hit_rate, 33.3);
        assert_eq!(snapshot.avg_response_time_ms, 10.0);
        assert_eq!(snapshot.recent_requests.len(), 3);
    }

    #[test]
    fn ring_is_bounded() {
        let stats = StatsRecorder::new();
        for i in 0..250 {
            stats.record("GET", &format!("/r/{i}"), 200, 1.0, false);
        }
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.recent_requests.len(), RECENT_CAPACITY);
        // Oldest entries fell off the front.
        assert_eq!(snapshot.recent_requests[0].path, "/r/150");
    }

    #[test]
    fn pattern_counts_scan_the_ring() {
        let stats = StatsRecorder::new();
        stats.record("GET", "/api/a", 200, 1.0, false);
        stats.record("GET", "/api/b", 200, 1.0, false);
        stats.record("GET", "/other", 200, 1.0, false);

        let re = Regex::new("^/api/.*$").unwrap();
        assert_eq!(stats.recent_matching(&re), 2);
    }

    #[test]
    fn empty_recorder_has_zero_rates() {
        let snapshot = StatsRecorder::new().snapshot();
        assert_eq!(snapshot.cache_hit_rate, 0.0);
        assert_eq!(snapshot.avg_response_time_ms, 0.0);
    }
}
