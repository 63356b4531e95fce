use serde::Serialize;
use tracing::{debug, info, warn};

use crate::notifier::{format_alert, format_batch, Notifier};
use crate::state::alert_store::{AlertCooldownStore, CooldownPolicy, BATCH_KEY};
use crate::state::clock::Clock;
use crate::types::{Direction, Grade, ScoredRow};

/// Which rows are worth a notification.
#[derive(Debug, Clone)]
pub struct AlertRule {
    pub min_grade: Grade,
    pub min_score: Option<f64>,
    pub skip_misaligned: bool,
}

impl AlertRule {
    pub fn is_eligible(&self, row: &ScoredRow) -> bool {
        if row.grade < self.min_grade {
            return false;
        }
        if self.min_score.is_some_and(|min| row.score < min) {
            return false;
        }
        !(self.skip_misaligned && row.direction == Some(Direction::Misaligned))
    }
}

impl Default for AlertRule {
    fn default() -> Self {
        Self {
            min_grade: Grade::APlus,
            min_score: None,
            skip_misaligned: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// One message per eligible symbol.
    PerSymbol,
    /// One combined message, gated by the batch key.
    Batch,
}

impl std::str::FromStr for AlertMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per_symbol" | "symbol" => Ok(AlertMode::PerSymbol),
            "batch" => Ok(AlertMode::Batch),
            other => Err(format!("ALERT_MODE must be per_symbol or batch (got '{other}')")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub eligible: usize,
    pub sent: usize,
    /// Eligible but still inside the cooldown window.
    pub suppressed: usize,
    pub failed: usize,
}

/// Gates outbound notifications through the cooldown store.
pub struct AlertDispatcher<N, C> {
    store: AlertCooldownStore,
    notifier: N,
    clock: C,
    rule: AlertRule,
    mode: AlertMode,
}

impl<N: Notifier, C: Clock> AlertDispatcher<N, C> {
    pub fn new(
        store: AlertCooldownStore,
        notifier: N,
        clock: C,
        rule: AlertRule,
        mode: AlertMode,
    ) -> Self {
        Self {
            store,
            notifier,
            clock,
            rule,
            mode,
        }
    }

    pub fn store(&self) -> &AlertCooldownStore {
        &self.store
    }

    pub async fn dispatch(&mut self, rows: &[ScoredRow]) -> DispatchReport {
        let eligible: Vec<&ScoredRow> = rows.iter().filter(|r| self.rule.is_eligible(r)).collect();
        if eligible.is_empty() {
            return DispatchReport::default();
        }
        match self.mode {
            AlertMode::PerSymbol => self.dispatch_each(&eligible).await,
            AlertMode::Batch => self.dispatch_batch(&eligible).await,
        }
    }

    async fn dispatch_each(&mut self, eligible: &[&ScoredRow]) -> DispatchReport {
        let now = self.clock.now();
        let mut report = DispatchReport {
            eligible: eligible.len(),
            ..Default::default()
        };

        for row in eligible {
            if !self.store.should_send(&row.symbol, now) {
                debug!(symbol = %row.symbol, "Alert suppressed by cooldown");
                report.suppressed += 1;
                continue;
            }
            match self.notifier.send(&format_alert(row)).await {
                Ok(()) => {
                    self.store.record_sent(&row.symbol, now);
                    report.sent += 1;
                    info!(
                        symbol = %row.symbol,
                        grade = %row.grade,
                        score = row.score,
                        "Alert sent: {} {} {:.2}",
                        row.symbol, row.grade, row.score,
                    );
                }
                Err(e) => {
                    report.failed += 1;
                    warn!(symbol = %row.symbol, "Alert delivery failed: {e}");
                }
            }
        }
        report
    }

    async fn dispatch_batch(&mut self, eligible: &[&ScoredRow]) -> DispatchReport {
        let now = self.clock.now();
        let due: Vec<&ScoredRow> = eligible
            .iter()
            .copied()
            .filter(|r| self.store.should_send(&r.symbol, now))
            .collect();
        let mut report = DispatchReport {
            eligible: eligible.len(),
            suppressed: eligible.len() - due.len(),
            ..Default::default()
        };

        // Under `Once` the batch key would never come due again; per-symbol
        // records already stop repeats, so only a time window gates batches.
        let batch_due = self.store.cooldown() == CooldownPolicy::Once
            || self.store.should_send(BATCH_KEY, now);
        if due.is_empty() || !batch_due {
            debug!(due = due.len(), "Batch alert suppressed by cooldown");
            report.suppressed = eligible.len();
            return report;
        }

        match self.notifier.send(&format_batch(&due)).await {
            Ok(()) => {
                let keys = std::iter::once(BATCH_KEY).chain(due.iter().map(|r| r.symbol.as_str()));
                self.store.record_many(keys, now);
                report.sent = due.len();
                info!(symbols = due.len(), "Batch alert sent for {} symbols", due.len());
            }
            Err(e) => {
                report.failed = due.len();
                warn!(symbols = due.len(), "Batch alert delivery failed: {e}");
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use chrono::Duration;
    use tempfile::TempDir;

    use super::*;
    use crate::config::ScoringConfig;
    use crate::error::{AppError, Result};
    use crate::scorer::build_snapshot;
    use crate::state::alert_store::CooldownPolicy;
    use crate::state::clock::FakeClock;

    /// Records every message; fails while `failing` is set.
    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<String>>,
        failing: Mutex<bool>,
    }

    impl RecordingNotifier {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }

        fn set_failing(&self, v: bool) {
            *self.failing.lock().unwrap() = v;
        }
    }

    impl Notifier for Arc<RecordingNotifier> {
        async fn send(&self, text: &str) -> Result<()> {
            if *self.failing.lock().unwrap() {
                return Err(AppError::Notify("HTTP 502".to_string()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn row(symbol: &str, score: f64, grade: Grade, direction: Option<Direction>) -> ScoredRow {
        ScoredRow {
            rank: 1,
            symbol: symbol.to_string(),
            change_pct: 1.0,
            size: 1000.0,
            secondary_size: None,
            last_price: None,
            lag_ratio: 500.0,
            score,
            grade,
            direction,
            priority: None,
        }
    }

    struct Harness {
        _dir: TempDir,
        notifier: Arc<RecordingNotifier>,
        clock: Arc<FakeClock>,
        dispatcher: AlertDispatcher<Arc<RecordingNotifier>, Arc<FakeClock>>,
    }

    fn harness(mode: AlertMode, cooldown: CooldownPolicy) -> Harness {
        let dir = TempDir::new().unwrap();
        let (store, _) = AlertCooldownStore::open(dir.path().join("alerts.json"), cooldown);
        let notifier = Arc::new(RecordingNotifier::default());
        let clock = Arc::new(FakeClock::epoch());
        let dispatcher = AlertDispatcher::new(
            store,
            Arc::clone(&notifier),
            Arc::clone(&clock),
            AlertRule::default(),
            mode,
        );
        Harness {
            _dir: dir,
            notifier,
            clock,
            dispatcher,
        }
    }

    #[test]
    fn rule_respects_grade_score_and_direction() {
        let rule = AlertRule {
            min_grade: Grade::A,
            min_score: Some(70.0),
            skip_misaligned: true,
        };
        assert!(rule.is_eligible(&row("X", 75.0, Grade::A, Some(Direction::Long))));
        assert!(!rule.is_eligible(&row("X", 65.0, Grade::A, None)));
        assert!(!rule.is_eligible(&row("X", 95.0, Grade::B, None)));
        assert!(!rule.is_eligible(&row("X", 95.0, Grade::APlus, Some(Direction::Misaligned))));
    }

    #[tokio::test]
    async fn end_to_end_only_top_row_notifies() {
        let mut h = harness(AlertMode::PerSymbol, CooldownPolicy::minutes(60));
        let payload = serde_json::json!([
            {"symbol": "BTCUSDT", "priceChangePercent": "5", "quoteVolume": "1000"},
            {"symbol": "ETHUSDT", "priceChangePercent": "1", "quoteVolume": "1000"},
        ]);
        let snapshot = build_snapshot(payload.as_array().unwrap(), None, &ScoringConfig::default());

        let report = h.dispatcher.dispatch(&snapshot.rows).await;
        assert_eq!(report, DispatchReport { eligible: 1, sent: 1, suppressed: 0, failed: 0 });
        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("Symbol: ETHUSDT"));
        assert!(h.dispatcher.store().last_sent("ETHUSDT").is_some());
        assert!(h.dispatcher.store().last_sent("BTCUSDT").is_none());
    }

    #[tokio::test]
    async fn second_dispatch_inside_cooldown_is_suppressed() {
        let mut h = harness(AlertMode::PerSymbol, CooldownPolicy::minutes(60));
        let rows = vec![row("ETHUSDT", 100.0, Grade::APlus, None)];

        assert_eq!(h.dispatcher.dispatch(&rows).await.sent, 1);

        h.clock.advance(Duration::minutes(15));
        let report = h.dispatcher.dispatch(&rows).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.suppressed, 1);
        assert_eq!(h.notifier.messages().len(), 1);

        h.clock.advance(Duration::minutes(45));
        assert_eq!(h.dispatcher.dispatch(&rows).await.sent, 1);
        assert_eq!(h.notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn failed_delivery_is_not_recorded() {
        let mut h = harness(AlertMode::PerSymbol, CooldownPolicy::minutes(60));
        let rows = vec![row("ETHUSDT", 100.0, Grade::APlus, None)];

        h.notifier.set_failing(true);
        let report = h.dispatcher.dispatch(&rows).await;
        assert_eq!(report.failed, 1);
        assert!(h.dispatcher.store().is_empty());

        h.notifier.set_failing(false);
        assert_eq!(h.dispatcher.dispatch(&rows).await.sent, 1);
    }

    #[tokio::test]
    async fn batch_mode_sends_one_message_and_gates_on_batch_key() {
        let mut h = harness(AlertMode::Batch, CooldownPolicy::minutes(60));
        let rows = vec![
            row("ETHUSDT", 100.0, Grade::APlus, None),
            row("SOLUSDT", 90.0, Grade::APlus, None),
            row("XRPUSDT", 50.0, Grade::B, None),
        ];

        let report = h.dispatcher.dispatch(&rows).await;
        assert_eq!(report, DispatchReport { eligible: 2, sent: 2, suppressed: 0, failed: 0 });
        assert_eq!(h.notifier.messages().len(), 1);
        assert!(h.dispatcher.store().last_sent(BATCH_KEY).is_some());

        // A new symbol inside the batch window waits for the window.
        h.clock.advance(Duration::minutes(10));
        let more = vec![row("ADAUSDT", 95.0, Grade::APlus, None)];
        let report = h.dispatcher.dispatch(&more).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.suppressed, 1);

        h.clock.advance(Duration::minutes(50));
        let report = h.dispatcher.dispatch(&more).await;
        assert_eq!(report.sent, 1);
        assert_eq!(h.notifier.messages().len(), 2);
        assert!(h.notifier.messages()[1].contains("ADAUSDT"));
    }

    #[tokio::test]
    async fn once_policy_alerts_each_symbol_a_single_time() {
        let mut h = harness(AlertMode::PerSymbol, CooldownPolicy::Once);
        let rows = vec![row("ETHUSDT", 100.0, Grade::APlus, None)];
        h.dispatcher.dispatch(&rows).await;
        h.clock.advance(Duration::days(30));
        let report = h.dispatcher.dispatch(&rows).await;
        assert_eq!(report.suppressed, 1);
        assert_eq!(h.notifier.messages().len(), 1);
    }

    #[tokio::test]
    async fn batch_once_still_alerts_new_symbols() {
        let mut h = harness(AlertMode::Batch, CooldownPolicy::Once);
        let first = vec![row("ETHUSDT", 100.0, Grade::APlus, None)];
        assert_eq!(h.dispatcher.dispatch(&first).await.sent, 1);

        h.clock.advance(Duration::days(7));
        let rows = vec![
            row("ETHUSDT", 100.0, Grade::APlus, None),
            row("NEWUSDT", 95.0, Grade::APlus, None),
        ];
        let report = h.dispatcher.dispatch(&rows).await;
        assert_eq!(report, DispatchReport { eligible: 2, sent: 1, suppressed: 1, failed: 0 });
        let messages = h.notifier.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[1].contains("NEWUSDT"));
        assert!(!messages[1].contains("ETHUSDT"));

        // Both symbols are now spent for good.
        h.clock.advance(Duration::days(7));
        let report = h.dispatcher.dispatch(&rows).await;
        assert_eq!(report.sent, 0);
        assert_eq!(report.suppressed, 2);
        assert_eq!(h.notifier.messages().len(), 2);
    }
}
