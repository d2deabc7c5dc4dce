// SPDX-License-Identifier: MIT
//
// HMAC_RNG: extract-then-expand random bit generator
// Copyright (c) 2025 HMAC_RNG Contributors

//! Metrics collection and reporting

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Generator metrics handle, cheap to clone
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    // Reseed metrics
    reseeds_total: AtomicU64,
    reseeds_forced: AtomicU64,

    // Output metrics
    requests_total: AtomicU64,
    requests_unseeded: AtomicU64,
    bytes_generated: AtomicU64,

    // Poll metrics
    fast_polls: AtomicU64,
    slow_polls: AtomicU64,
    stir_polls: AtomicU64,
    bytes_polled: AtomicU64,

    // Slow poll latency tracking (microseconds)
    slow_poll_latencies: RwLock<Vec<u64>>,
}

/// Point-in-time copy of all counters
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_seconds: u64,
    pub reseeds_total: u64,
    pub reseeds_forced: u64,
    pub requests_total: u64,
    pub requests_unseeded: u64,
    pub bytes_generated: u64,
    pub fast_polls: u64,
    pub slow_polls: u64,
    pub stir_polls: u64,
    pub bytes_polled: u64,
    pub slow_poll_p50_micros: Option<u64>,
    pub slow_poll_p99_micros: Option<u64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                reseeds_total: AtomicU64::new(0),
                reseeds_forced: AtomicU64::new(0),
                requests_total: AtomicU64::new(0),
                requests_unseeded: AtomicU64::new(0),
                bytes_generated: AtomicU64::new(0),
                fast_polls: AtomicU64::new(0),
                slow_polls: AtomicU64::new(0),
                stir_polls: AtomicU64::new(0),
                bytes_polled: AtomicU64::new(0),
                slow_poll_latencies: RwLock::new(Vec::with_capacity(1024)),
            }),
        }
    }

    // Reseed metrics
    pub fn record_reseed(&self, forced: bool) {
        self.inner.reseeds_total.fetch_add(1, Ordering::Relaxed);
        if forced {
            self.inner.reseeds_forced.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn reseeds_total(&self) -> u64 {
        self.inner.reseeds_total.load(Ordering::Relaxed)
    }

    pub fn reseeds_forced(&self) -> u64 {
        self.inner.reseeds_forced.load(Ordering::Relaxed)
    }

    // Output metrics
    pub fn record_request(&self, bytes: usize) {
        self.inner.requests_total.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_generated.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_unseeded(&self) {
        self.inner.requests_unseeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.inner.requests_total.load(Ordering::Relaxed)
    }

    pub fn requests_unseeded(&self) -> u64 {
        self.inner.requests_unseeded.load(Ordering::Relaxed)
    }

    pub fn bytes_generated(&self) -> u64 {
        self.inner.bytes_generated.load(Ordering::Relaxed)
    }

    // Poll metrics
    pub fn record_fast_poll(&self, bytes: usize) {
        self.inner.fast_polls.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_polled.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_slow_poll(&self, bytes: usize, latency_micros: u64) {
        self.inner.slow_polls.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_polled.fetch_add(bytes as u64, Ordering::Relaxed);

        let mut latencies = self.inner.slow_poll_latencies.write();
        latencies.push(latency_micros);
        if latencies.len() > 1024 {
            latencies.drain(0..512);
        }
    }

    pub fn record_stir_poll(&self, bytes: usize) {
        self.inner.stir_polls.fetch_add(1, Ordering::Relaxed);
        self.inner.bytes_polled.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn fast_polls(&self) -> u64 {
        self.inner.fast_polls.load(Ordering::Relaxed)
    }

    pub fn slow_polls(&self) -> u64 {
        self.inner.slow_polls.load(Ordering::Relaxed)
    }

    pub fn stir_polls(&self) -> u64 {
        self.inner.stir_polls.load(Ordering::Relaxed)
    }

    pub fn bytes_polled(&self) -> u64 {
        self.inner.bytes_polled.load(Ordering::Relaxed)
    }

    // Derived metrics
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    pub fn slow_poll_latency_percentile(&self, percentile: f64) -> Option<u64> {
        let latencies = self.inner.slow_poll_latencies.read();
        if latencies.is_empty() {
            return None;
        }

        let mut sorted = latencies.clone();
        sorted.sort_unstable();
        let index = ((sorted.len() as f64 * percentile).ceil() as usize).min(sorted.len() - 1);
        Some(sorted[index])
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_seconds: self.uptime_seconds(),
            reseeds_total: self.reseeds_total(),
            reseeds_forced: self.reseeds_forced(),
            requests_total: self.requests_total(),
            requests_unseeded: self.requests_unseeded(),
            bytes_generated: self.bytes_generated(),
            fast_polls: self.fast_polls(),
            slow_polls: self.slow_polls(),
            stir_polls: self.stir_polls(),
            bytes_polled: self.bytes_polled(),
            slow_poll_p50_micros: self.slow_poll_latency_percentile(0.50),
            slow_poll_p99_micros: self.slow_poll_latency_percentile(0.99),
        }
    }

    /// Generate Prometheus-compatible metrics output
    pub fn prometheus_format(&self) -> String {
        let mut output = String::new();

        let counters = [
            ("reseeds_total", "Total number of reseeds", self.reseeds_total()),
            ("reseeds_forced_total", "Reseeds forced by the output counter", self.reseeds_forced()),
            ("requests_total", "Total number of output requests", self.requests_total()),
            ("requests_unseeded_total", "Requests refused while unseeded", self.requests_unseeded()),
            ("bytes_generated_total", "Total output bytes generated", self.bytes_generated()),
            ("fast_polls_total", "Total fast polls during reseeds", self.fast_polls()),
            ("slow_polls_total", "Total slow polls during reseeds", self.slow_polls()),
            ("stir_polls_total", "Total incidental polls during output", self.stir_polls()),
            ("bytes_polled_total", "Total bytes returned by entropy sources", self.bytes_polled()),
        ];

        for (name, help, value) in counters {
            output.push_str(&format!("# HELP hmac_rng_{} {}\n", name, help));
            output.push_str(&format!("# TYPE hmac_rng_{} counter\n", name));
            output.push_str(&format!("hmac_rng_{} {}\n", name, value));
        }

        output.push_str("# HELP hmac_rng_uptime_seconds Generator uptime in seconds\n");
        output.push_str("# TYPE hmac_rng_uptime_seconds gauge\n");
        output.push_str(&format!("hmac_rng_uptime_seconds {}\n", self.uptime_seconds()));

        if let Some(p50) = self.slow_poll_latency_percentile(0.50) {
            output.push_str("# HELP hmac_rng_slow_poll_p50_microseconds Slow poll latency 50th percentile\n");
            output.push_str("# TYPE hmac_rng_slow_poll_p50_microseconds gauge\n");
            output.push_str(&format!("hmac_rng_slow_poll_p50_microseconds {}\n", p50));
        }

        if let Some(p99) = self.slow_poll_latency_percentile(0.99) {
            output.push_str("# HELP hmac_rng_slow_poll_p99_microseconds Slow poll latency 99th percentile\n");
            output.push_str("# TYPE hmac_rng_slow_poll_p99_microseconds gauge\n");
            output.push_str(&format!("hmac_rng_slow_poll_p99_microseconds {}\n", p99));
        }

        output
    }
}
