use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::config::{Config, ScoringConfig};
use crate::fetcher::MarketDataClient;
use crate::notifier::{AlertDispatcher, DispatchReport, Notifier};
use crate::scorer::build_snapshot;
use crate::state::clock::Clock;
use crate::state::dashboard::{AlertEntry, AlertHistoryView};
use crate::state::DashboardState;
use crate::types::{ReferenceQuote, SnapshotOutcome};

#[derive(Debug, Clone)]
pub struct RefreshSettings {
    pub interval: Duration,
    pub reference_symbol: String,
    pub leaderboard_size: usize,
    pub scoring: ScoringConfig,
}

impl RefreshSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            interval: Duration::from_secs(cfg.refresh_interval_secs),
            reference_symbol: cfg.reference_symbol.clone(),
            leaderboard_size: cfg.leaderboard_size,
            scoring: cfg.scoring.clone(),
        }
    }
}

/// Runs the fetch → score → publish → notify cycle on a fixed timer.
/// One tick always finishes before the next starts.
pub struct SnapshotRefresher<N, C> {
    settings: RefreshSettings,
    market: MarketDataClient,
    state: Arc<DashboardState>,
    alerts: Option<AlertDispatcher<N, C>>,
}

impl<N: Notifier, C: Clock> SnapshotRefresher<N, C> {
    pub fn new(
        settings: RefreshSettings,
        market: MarketDataClient,
        state: Arc<DashboardState>,
        alerts: Option<AlertDispatcher<N, C>>,
    ) -> Self {
        let refresher = Self {
            settings,
            market,
            state,
            alerts,
        };
        refresher.publish_alert_history(None);
        refresher
    }

    pub async fn run(mut self) {
        let mut ticker = interval(self.settings.interval);
        // A slow fetch pushes the schedule back instead of bunching ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }

    /// One full refresh cycle. Never fails: upstream trouble shows up as a
    /// stale or empty board.
    pub async fn tick(&mut self) -> Option<DispatchReport> {
        let (outcome, reference) = self.load_snapshot().await;
        let now = Utc::now();

        match outcome {
            SnapshotOutcome::Ready(mut snapshot) => {
                snapshot.rows.truncate(self.settings.leaderboard_size);
                let top = snapshot.rows.first().map(|r| (r.symbol.clone(), r.score));
                info!(
                    received = snapshot.received,
                    parsed = snapshot.parsed,
                    shown = snapshot.rows.len(),
                    regime = ?snapshot.regime,
                    "Snapshot refreshed: {} shown of {} parsed, top: {}",
                    snapshot.rows.len(),
                    snapshot.parsed,
                    top.map_or("none".to_string(), |(s, score)| format!("{s} ({score:.1})")),
                );

                let rows = snapshot.rows.clone();
                self.state.publish_snapshot(snapshot, reference, now);

                let report = match self.alerts.as_mut() {
                    Some(dispatcher) => dispatcher.dispatch(&rows).await,
                    None => return None,
                };
                self.publish_alert_history(Some(report));
                Some(report)
            }
            SnapshotOutcome::Unavailable(reason) => {
                warn!(
                    failures = self.state.health.consecutive_failures() + 1,
                    "Market data unavailable, keeping last board: {reason}"
                );
                self.state.publish_unavailable(reason, now);
                None
            }
        }
    }

    async fn load_snapshot(&self) -> (SnapshotOutcome, Option<ReferenceQuote>) {
        let started = Instant::now();
        let reference = match self.market.fetch_reference(&self.settings.reference_symbol).await {
            Ok(q) => Some(q),
            Err(e) => {
                warn!(
                    symbol = %self.settings.reference_symbol,
                    "Reference quote unavailable, directions disabled this tick: {e}"
                );
                None
            }
        };
        self.state.latency.record(started.elapsed());

        let started = Instant::now();
        let fetched = self.market.fetch_tickers().await;
        self.state.latency.record(started.elapsed());

        let outcome = match fetched {
            Ok(items) => SnapshotOutcome::Ready(build_snapshot(
                &items,
                reference.as_ref().map(|q| q.change_pct),
                &self.settings.scoring,
            )),
            Err(e) => SnapshotOutcome::Unavailable(e.to_string()),
        };
        (outcome, reference)
    }

    fn publish_alert_history(&self, report: Option<DispatchReport>) {
        let Some(dispatcher) = &self.alerts else {
            return;
        };
        let store = dispatcher.store();
        self.state.publish_alerts(AlertHistoryView {
            enabled: true,
            cooldown: store.cooldown().to_string(),
            entries: store
                .entries()
                .into_iter()
                .map(|(key, last_sent_at)| AlertEntry { key, last_sent_at })
                .collect(),
            last_report: report,
        });
    }
}
