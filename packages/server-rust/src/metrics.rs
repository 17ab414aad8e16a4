//! Process-wide request metrics with a bounded latency window.
//!
//! One [`Metrics`] instance is created at startup and shared via `Arc`
//! between the request middleware (writer) and the `/metrics` endpoint
//! (reader).

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Number of recent latencies kept for the rolling average.
pub const DEFAULT_WINDOW: usize = 100;

/// Thread-safe request counters and rolling average latency.
#[derive(Debug)]
pub struct Metrics {
    inner: RwLock<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    request_count: u64,
    error_count: u64,
    last_request_time: Option<DateTime<Utc>>,
    average_request_ms: f64,
    durations: VecDeque<Duration>,
    capacity: usize,
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub request_count: u64,
    pub error_count: u64,
    /// `None` until the first successful request.
    pub last_request_time: Option<DateTime<Utc>>,
    pub average_request_ms: f64,
}

impl Metrics {
    /// Creates a collector with the [`DEFAULT_WINDOW`] capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_window(DEFAULT_WINDOW)
    }

    /// Creates a collector averaging over the last `capacity` requests.
    /// A capacity of 0 is raised to 1.
    #[must_use]
    pub fn with_window(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: RwLock::new(MetricsInner {
                request_count: 0,
                error_count: 0,
                last_request_time: None,
                average_request_ms: 0.0,
                durations: VecDeque::with_capacity(capacity),
                capacity,
            }),
        }
    }

    /// Records a successful request and recomputes the rolling average.
    pub fn record_success(&self, duration: Duration) {
        let mut inner = self.inner.write();

        inner.request_count += 1;
        inner.last_request_time = Some(Utc::now());

        inner.durations.push_back(duration);
        while inner.durations.len() > inner.capacity {
            inner.durations.pop_front();
        }

        let total: Duration = inner.durations.iter().sum();
        #[allow(clippy::cast_precision_loss)]
        let average = total.as_nanos() as f64 / inner.durations.len() as f64 / 1e6;
        inner.average_request_ms = average;
    }

    /// Records a failed request. Latency state is left untouched.
    pub fn record_error(&self) {
        self.inner.write().error_count += 1;
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.read();
        MetricsSnapshot {
            request_count: inner.request_count,
            error_count: inner.error_count,
            last_request_time: inner.last_request_time,
            average_request_ms: inner.average_request_ms,
        }
    }

    /// Capacity of the latency window.
    #[must_use]
    pub fn window(&self) -> usize {
        self.inner.read().capacity
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    const TOLERANCE_MS: f64 = 0.001;

    #[test]
    fn new_metrics_are_zeroed() {
        let metrics = Metrics::new();
        let snap = metrics.snapshot();
        assert_eq!(snap.request_count, 0);
        assert_eq!(snap.error_count, 0);
        assert!(snap.last_request_time.is_none());
        assert!(snap.average_request_ms.abs() < f64::EPSILON);
        assert_eq!(metrics.window(), DEFAULT_WINDOW);
    }

    #[test]
    fn record_success_updates_average() {
        let metrics = Metrics::new();
        for ms in [50, 100, 150] {
            metrics.record_success(Duration::from_millis(ms));
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.request_count, 3);
        assert_eq!(snap.error_count, 0);
        assert!((snap.average_request_ms - 100.0).abs() < TOLERANCE_MS);
        assert!(snap.last_request_time.is_some());
    }

    #[test]
    fn window_evicts_oldest_durations() {
        let metrics = Metrics::with_window(3);
        for ms in [10, 20, 100, 200, 300] {
            metrics.record_success(Duration::from_millis(ms));
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.request_count, 5);
        assert!((snap.average_request_ms - 200.0).abs() < TOLERANCE_MS);
    }

    #[test]
    fn record_error_only_touches_error_count() {
        let metrics = Metrics::new();
        metrics.record_success(Duration::from_millis(40));
        let before = metrics.snapshot();

        metrics.record_error();
        metrics.record_error();

        let after = metrics.snapshot();
        assert_eq!(after.error_count, 2);
        assert_eq!(after.request_count, before.request_count);
        assert_eq!(after.last_request_time, before.last_request_time);
        assert!((after.average_request_ms - before.average_request_ms).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_window_is_raised_to_one() {
        let metrics = Metrics::with_window(0);
        metrics.record_success(Duration::from_millis(10));
        metrics.record_success(Duration::from_millis(30));
        assert_eq!(metrics.window(), 1);
        assert!((metrics.snapshot().average_request_ms - 30.0).abs() < TOLERANCE_MS);
    }

    #[test]
    fn snapshot_serializes_with_expected_keys() {
        let metrics = Metrics::new();
        metrics.record_success(Duration::from_millis(5));
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["request_count"], 1);
        assert_eq!(json["error_count"], 0);
        assert!(json["last_request_time"].is_string());
        assert!(json["average_request_ms"].is_number());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_recording_loses_no_updates() {
        let metrics = Arc::new(Metrics::new());
        let mut tasks = Vec::new();

        for i in 0..150 {
            let metrics = Arc::clone(&metrics);
            tasks.push(tokio::spawn(async move {
                if i % 3 == 2 {
                    metrics.record_error();
                } else {
                    metrics.record_success(Duration::from_millis(i));
                }
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }

        let snap = metrics.snapshot();
        assert_eq!(snap.request_count, 100);
        assert_eq!(snap.error_count, 50);
    }

    mod props {
        use proptest::prelude::*;

        use super::*;

        proptest! {
            #[test]
            fn average_is_mean_of_most_recent_window(
                window in 1usize..8,
                samples in proptest::collection::vec(0u64..5_000, 1..40),
            ) {
                let metrics = Metrics::with_window(window);
                for ms in &samples {
                    metrics.record_success(Duration::from_millis(*ms));
                }

                let recent = &samples[samples.len().saturating_sub(window)..];
                #[allow(clippy::cast_precision_loss)]
                let expected = recent.iter().sum::<u64>() as f64 / recent.len() as f64;

                let snap = metrics.snapshot();
                prop_assert_eq!(snap.request_count, samples.len() as u64);
                prop_assert!((snap.average_request_ms - expected).abs() < TOLERANCE_MS);
            }
        }
    }
}
