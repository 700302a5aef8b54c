//! Runtime counters for the service surface: query latency samples plus
//! batch-aware add/delete accounting.

use serde::Serialize;
use std::time::Duration;

/// Point-in-time view of the collected counters, shaped for the
/// `/metrics` endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub total_queries: u64,
    pub add_batches: u64,
    pub records_added: u64,
    pub delete_calls: u64,
    pub records_deleted: u64,
    pub avg_query_latency_us: f64,
    pub p50_query_latency_us: f64,
    pub p95_query_latency_us: f64,
    pub p99_query_latency_us: f64,
}

/// Collects operation counters. Adds and deletes are batch operations,
/// so the call count and the per-record totals are tracked separately.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    query_latencies_us: Vec<f64>,
    add_batches: u64,
    records_added: u64,
    delete_calls: u64,
    records_deleted: u64,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a nearest-neighbor query with its duration.
    pub fn record_query(&mut self, duration: Duration) {
        self.query_latencies_us.push(duration.as_micros() as f64);
    }

    /// Record one add call covering `records` embeddings.
    pub fn record_add(&mut self, records: usize) {
        self.add_batches += 1;
        self.records_added += records as u64;
    }

    /// Record one delete call that removed `records` embeddings.
    pub fn record_delete(&mut self, records: usize) {
        self.delete_calls += 1;
        self.records_deleted += records as u64;
    }

    pub fn total_queries(&self) -> u64 {
        self.query_latencies_us.len() as u64
    }

    pub fn records_added(&self) -> u64 {
        self.records_added
    }

    pub fn records_deleted(&self) -> u64 {
        self.records_deleted
    }

    /// Average query latency in microseconds.
    pub fn avg_query_latency_us(&self) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.query_latencies_us.iter().sum();
        sum / self.query_latencies_us.len() as f64
    }

    /// Nearest-rank percentile over the recorded query latencies; 0.0
    /// when nothing has been recorded yet.
    pub fn percentile_query_latency_us(&self, percentile: f64) -> f64 {
        if self.query_latencies_us.is_empty() {
            return 0.0;
        }
        let mut sorted = self.query_latencies_us.clone();
        sorted.sort_by(f64::total_cmp);

        let rank = ((percentile / 100.0) * (sorted.len() - 1) as f64).round() as usize;
        sorted[rank.min(sorted.len() - 1)]
    }

    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total_queries: self.total_queries(),
            add_batches: self.add_batches,
            records_added: self.records_added,
            delete_calls: self.delete_calls,
            records_deleted: self.records_deleted,
            avg_query_latency_us: self.avg_query_latency_us(),
            p50_query_latency_us: self.percentile_query_latency_us(50.0),
            p95_query_latency_us: self.percentile_query_latency_us(95.0),
            p99_query_latency_us: self.percentile_query_latency_us(99.0),
        }
    }
}
