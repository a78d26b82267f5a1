//! Observability metrics: query and upload latency, ingestion volume, session resets.

use serde::Serialize;
use std::collections::VecDeque;
use std::time::Duration;

/// Number of recent samples kept per latency window.
pub const LATENCY_WINDOW: usize = 1024;

/// Sliding window over the most recent latency samples, in microseconds.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            samples: VecDeque::with_capacity(capacity.min(LATENCY_WINDOW)),
            capacity: capacity.max(1),
        }
    }

    pub fn record(&mut self, duration: Duration) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(duration.as_micros() as f64);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn mean(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }

    /// Nearest-rank percentile (`pct` in 0..=100). Zero when no samples exist.
    pub fn percentile(&self, pct: f64) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let mut sorted: Vec<f64> = self.samples.iter().copied().collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = sorted.len();
        let rank = ((pct.clamp(0.0, 100.0) / 100.0) * n as f64).ceil() as usize;
        sorted[rank.clamp(1, n) - 1]
    }

    fn summary(&self) -> LatencySummary {
        LatencySummary {
            samples: self.len(),
            avg_us: self.mean(),
            p50_us: self.percentile(50.0),
            p95_us: self.percentile(95.0),
            p99_us: self.percentile(99.0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencySummary {
    pub samples: usize,
    pub avg_us: f64,
    pub p50_us: f64,
    pub p95_us: f64,
    pub p99_us: f64,
}

/// Point-in-time view served by `GET /metrics`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_queries: u64,
    pub total_uploads: u64,
    pub failed_uploads: u64,
    pub total_chunks_added: u64,
    pub total_clears: u64,
    pub query_latency: LatencySummary,
    pub upload_latency: LatencySummary,
}

/// Collects runtime metrics for the search service.
#[derive(Debug)]
pub struct MetricsCollector {
    queries: LatencyWindow,
    uploads: LatencyWindow,
    total_queries: u64,
    total_uploads: u64,
    failed_uploads: u64,
    total_chunks_added: u64,
    total_clears: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            queries: LatencyWindow::new(LATENCY_WINDOW),
            uploads: LatencyWindow::new(LATENCY_WINDOW),
            total_queries: 0,
            total_uploads: 0,
            failed_uploads: 0,
            total_chunks_added: 0,
            total_clears: 0,
        }
    }

    pub fn record_query(&mut self, duration: Duration) {
        self.total_queries += 1;
        self.queries.record(duration);
    }

    /// Record a successful upload request and the chunks it added.
    pub fn record_upload(&mut self, chunks_added: usize, duration: Duration) {
        self.total_uploads += 1;
        self.total_chunks_added += chunks_added as u64;
        self.uploads.record(duration);
    }

    pub fn record_failed_upload(&mut self) {
        self.failed_uploads += 1;
    }

    pub fn record_clear(&mut self) {
        self.total_clears += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_queries: self.total_queries,
            total_uploads: self.total_uploads,
            failed_uploads: self.failed_uploads,
            total_chunks_added: self.total_chunks_added,
            total_clears: self.total_clears,
            query_latency: self.queries.summary(),
            upload_latency: self.uploads.summary(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
