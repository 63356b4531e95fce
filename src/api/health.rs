//! Shared health counters for the /health endpoint.
//! Written by the refresh loop, read by the API.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub struct HealthState {
    /// Millisecond UTC epoch of the last successful refresh (0 = none yet).
    last_success_at_ms: AtomicI64,
    /// Millisecond UTC epoch of the last tick, successful or not.
    last_tick_at_ms: AtomicI64,
    consecutive_failures: AtomicU64,
    ticks_total: AtomicU64,
    alerts_sent_total: AtomicU64,
    alerts_failed_total: AtomicU64,
    notifications_enabled: AtomicBool,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub last_success_at_ms: Option<i64>,
    pub last_tick_at_ms: Option<i64>,
    pub consecutive_failures: u64,
    pub ticks_total: u64,
    pub alerts_sent_total: u64,
    pub alerts_failed_total: u64,
    pub notifications_enabled: bool,
}

impl HealthState {
    pub fn new(notifications_enabled: bool) -> Self {
        let s = Self::default();
        s.notifications_enabled
            .store(notifications_enabled, Ordering::Relaxed);
        s
    }

    pub fn record_success(&self, at_ms: i64) {
        self.last_success_at_ms.store(at_ms, Ordering::Relaxed);
        self.last_tick_at_ms.store(at_ms, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, at_ms: i64) {
        self.last_tick_at_ms.store(at_ms, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        self.ticks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_alerts(&self, sent: u64, failed: u64) {
        self.alerts_sent_total.fetch_add(sent, Ordering::Relaxed);
        self.alerts_failed_total.fetch_add(failed, Ordering::Relaxed);
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn report(&self) -> HealthReport {
        let nonzero = |v: i64| (v != 0).then_some(v);
        let last_success = nonzero(self.last_success_at_ms.load(Ordering::Relaxed));
        let failures = self.consecutive_failures();
        let status = match (last_success, failures) {
            (None, 0) => "starting",
            (None, _) => "no_data",
            (Some(_), 0) => "ok",
            (Some(_), _) => "degraded",
        };
        HealthReport {
            status,
            last_success_at_ms: last_success,
            last_tick_at_ms: nonzero(self.last_tick_at_ms.load(Ordering::Relaxed)),
            consecutive_failures: failures,
            ticks_total: self.ticks_total.load(Ordering::Relaxed),
            alerts_sent_total: self.alerts_sent_total.load(Ordering::Relaxed),
            alerts_failed_total: self.alerts_failed_total.load(Ordering::Relaxed),
            notifications_enabled: self.notifications_enabled.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_moves_through_lifecycle() {
        let h = HealthState::new(false);
        assert_eq!(h.report().status, "starting");

        h.record_failure(1_000);
        assert_eq!(h.report().status, "no_data");

        h.record_success(2_000);
        let r = h.report();
        assert_eq!(r.status, "ok");
        assert_eq!(r.last_success_at_ms, Some(2_000));
        assert_eq!(r.ticks_total, 2);

        h.record_failure(3_000);
        h.record_failure(4_000);
        let r = h.report();
        assert_eq!(r.status, "degraded");
        assert_eq!(r.consecutive_failures, 2);
        assert_eq!(r.last_tick_at_ms, Some(4_000));
    }

    #[test]
    fn alert_counters_accumulate() {
        let h = HealthState::new(true);
        h.add_alerts(2, 1);
        h.add_alerts(1, 0);
        let r = h.report();
        assert_eq!(r.alerts_sent_total, 3);
        assert_eq!(r.alerts_failed_total, 1);
        assert!(r.notifications_enabled);
    }
}
