//! Upstream fetch latency histogram.
//! The refresh loop records each exchange round trip; the API reads percentiles.

use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;

/// Values stored in microseconds.
pub struct LatencyStats {
    inner: Mutex<hdrhistogram::Histogram<u64>>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct LatencyReport {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sample_count: u64,
}

impl LatencyStats {
    /// Tracks 1us to 120s (past any request timeout), 3 significant figures.
    pub fn new() -> Self {
        let histogram = hdrhistogram::Histogram::new_with_bounds(1, 120_000_000, 3)
            .expect("valid histogram bounds");
        Self {
            inner: Mutex::new(histogram),
        }
    }

    pub fn record(&self, d: Duration) {
        let us = d.as_micros().clamp(1, 120_000_000) as u64;
        if let Ok(mut h) = self.inner.lock() {
            let _ = h.record(us);
        }
    }

    pub fn report(&self) -> LatencyReport {
        let Ok(h) = self.inner.lock() else {
            return LatencyReport::default();
        };
        if h.len() == 0 {
            return LatencyReport::default();
        }
        let ms = |us: u64| Some(us as f64 / 1_000.0);
        LatencyReport {
            p50_ms: ms(h.value_at_quantile(0.5)),
            p95_ms: ms(h.value_at_quantile(0.95)),
            p99_ms: ms(h.value_at_quantile(0.99)),
            max_ms: ms(h.max()),
            sample_count: h.len(),
        }
    }
}

impl Default for LatencyStats {
    fn default() -> Self {
        Self::new()
    }
}
