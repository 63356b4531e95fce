use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::health::HealthState;
use crate::api::latency::LatencyStats;
use crate::notifier::dispatcher::DispatchReport;
use crate::types::{ReferenceQuote, Regime, ScoredRow, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoardStatus {
    /// No tick has completed yet.
    #[default]
    Loading,
    Live,
    /// Last tick failed; rows are from an earlier tick.
    Stale,
    /// Nothing to show: upstream failed before any good tick, or the
    /// snapshot came back empty.
    NoData,
}

/// What the dashboard renders. Replaced wholesale on every tick.
#[derive(Debug, Clone, Serialize, Default)]
pub struct Leaderboard {
    pub status: BoardStatus,
    /// Rows are left over from an earlier tick.
    pub stale: bool,
    pub refreshed_at: Option<DateTime<Utc>>,
    pub reference: Option<ReferenceQuote>,
    pub regime: Option<Regime>,
    pub received: usize,
    pub parsed: usize,
    pub rows: Vec<ScoredRow>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AlertEntry {
    pub key: String,
    pub last_sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AlertHistoryView {
    pub enabled: bool,
    pub cooldown: String,
    /// Newest first.
    pub entries: Vec<AlertEntry>,
    pub last_report: Option<DispatchReport>,
}

/// Read side shared with the HTTP handlers. Only the refresh loop writes.
pub struct DashboardState {
    board: RwLock<Leaderboard>,
    alerts: RwLock<AlertHistoryView>,
    pub health: HealthState,
    pub latency: LatencyStats,
}

impl DashboardState {
    pub fn new(notifications_enabled: bool) -> Arc<Self> {
        Arc::new(Self {
            board: RwLock::new(Leaderboard::default()),
            alerts: RwLock::new(AlertHistoryView {
                enabled: notifications_enabled,
                ..Default::default()
            }),
            health: HealthState::new(notifications_enabled),
            latency: LatencyStats::new(),
        })
    }

    pub fn publish_snapshot(
        &self,
        snapshot: Snapshot,
        reference: Option<ReferenceQuote>,
        now: DateTime<Utc>,
    ) {
        let status = if snapshot.rows.is_empty() {
            BoardStatus::NoData
        } else {
            BoardStatus::Live
        };
        if let Ok(mut board) = self.board.write() {
            *board = Leaderboard {
                status,
                stale: false,
                refreshed_at: Some(now),
                reference,
                regime: snapshot.regime,
                received: snapshot.received,
                parsed: snapshot.parsed,
                rows: snapshot.rows,
                last_error: None,
            };
        }
        self.health.record_success(now.timestamp_millis());
    }

    /// Keep the last good rows on screen and flag them stale.
    pub fn publish_unavailable(&self, reason: String, now: DateTime<Utc>) {
        if let Ok(mut board) = self.board.write() {
            board.stale = !board.rows.is_empty();
            board.status = if board.stale {
                BoardStatus::Stale
            } else {
                BoardStatus::NoData
            };
            board.last_error = Some(reason);
        }
        self.health.record_failure(now.timestamp_millis());
    }

    pub fn publish_alerts(&self, view: AlertHistoryView) {
        if let Some(report) = &view.last_report {
            self.health
                .add_alerts(report.sent as u64, report.failed as u64);
        }
        if let Ok(mut alerts) = self.alerts.write() {
            *alerts = view;
        }
    }

    pub fn leaderboard(&self) -> Leaderboard {
        self.board.read().map(|b| b.clone()).unwrap_or_default()
    }

    pub fn alert_history(&self) -> AlertHistoryView {
        self.alerts.read().map(|a| a.clone()).unwrap_or_default()
    }
}
