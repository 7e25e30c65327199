use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

pub struct Metrics {
    // Counters
    total_requests: AtomicUsize,
    successful_requests: AtomicUsize,
    failed_requests: AtomicUsize,
    partial_results: AtomicUsize,

    // Timing (in microseconds)
    total_analysis_time_us: AtomicU64,

    // Counts
    total_chunks_analyzed: AtomicUsize,
    total_failed_chunks: AtomicUsize,
}

impl Metrics {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            total_requests: AtomicUsize::new(0),
            successful_requests: AtomicUsize::new(0),
            failed_requests: AtomicUsize::new(0),
            partial_results: AtomicUsize::new(0),
            total_analysis_time_us: AtomicU64::new(0),
            total_chunks_analyzed: AtomicUsize::new(0),
            total_failed_chunks: AtomicUsize::new(0),
        })
    }

    pub fn record_success(&self, duration: Duration, chunks: usize, failed_chunks: usize) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.successful_requests.fetch_add(1, Ordering::Relaxed);
        if failed_chunks > 0 {
            self.partial_results.fetch_add(1, Ordering::Relaxed);
        }
        self.total_analysis_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
        self.total_chunks_analyzed.fetch_add(chunks, Ordering::Relaxed);
        self.total_failed_chunks.fetch_add(failed_chunks, Ordering::Relaxed);
    }

    pub fn record_failure(&self, duration: Duration) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.failed_requests.fetch_add(1, Ordering::Relaxed);
        self.total_analysis_time_us
            .fetch_add(duration.as_micros() as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let total_requests = self.total_requests.load(Ordering::Relaxed);
        let total_us = self.total_analysis_time_us.load(Ordering::Relaxed) as f64;

        MetricsSnapshot {
            total_requests,
            successful_requests: self.successful_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
            partial_results: self.partial_results.load(Ordering::Relaxed),
            avg_analysis_time_ms: if total_requests > 0 {
                total_us / total_requests as f64 / 1000.0 // Convert to ms
            } else {
                0.0
            },
            total_chunks_analyzed: self.total_chunks_analyzed.load(Ordering::Relaxed),
            total_failed_chunks: self.total_failed_chunks.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    pub partial_results: usize,
    pub avg_analysis_time_ms: f64,
    pub total_chunks_analyzed: usize,
    pub total_failed_chunks: usize,
}

pub struct TimedOperation {
    start: Instant,
}

impl TimedOperation {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
