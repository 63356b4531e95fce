use chrono::{DateTime, Local};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// API response types (mirror the scanner's JSON shapes)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReferenceResponse {
    pub symbol: String,
    pub last_price: f64,
    pub change_pct: f64,
}

#[derive(Debug, Clone, Deserialize)]
#[allow(dead_code)]
pub struct RowResponse {
    pub rank: usize,
    pub symbol: String,
    pub change_pct: f64,
    pub last_price: Option<f64>,
    pub size: f64,
    pub lag_ratio: f64,
    pub score: f64,
    pub grade: String,
    pub direction: Option<String>,
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LeaderboardResponse {
    pub status: String,
    pub refreshed_at: Option<DateTime<Local>>,
    pub reference: Option<ReferenceResponse>,
    pub regime: Option<String>,
    pub received: usize,
    pub parsed: usize,
    pub rows: Vec<RowResponse>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertEntryResponse {
    pub key: String,
    pub last_sent_at: DateTime<Local>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AlertsResponse {
    pub enabled: bool,
    pub cooldown: String,
    pub entries: Vec<AlertEntryResponse>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct HealthResponse {
    pub status: String,
    pub consecutive_failures: u64,
    pub ticks_total: u64,
    pub alerts_sent_total: u64,
    pub alerts_failed_total: u64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[allow(dead_code)]
pub struct LatencyResponse {
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub sample_count: u64,
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionStatus {
    Connected,
    Error(String),
    Connecting,
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub status: ConnectionStatus,
    pub board: LeaderboardResponse,
    pub alerts: AlertsResponse,
    pub health: HealthResponse,
    pub latency: LatencyResponse,
    pub base_url: String,
}

impl AppState {
    pub fn new(base_url: String) -> Self {
        Self {
            status: ConnectionStatus::Connecting,
            board: LeaderboardResponse::default(),
            alerts: AlertsResponse::default(),
            health: HealthResponse::default(),
            latency: LatencyResponse::default(),
            base_url,
        }
    }

    /// The leaderboard decides connection status; the other panes keep their
    /// previous contents if their request fails.
    pub async fn refresh(&mut self, client: &reqwest::Client) {
        let board_url = format!("{}/api/leaderboard", self.base_url);
        let alerts_url = format!("{}/api/alerts", self.base_url);
        let health_url = format!("{}/health", self.base_url);
        let latency_url = format!("{}/stats/latency", self.base_url);

        let (board, alerts, health, latency) = tokio::join!(
            fetch_json::<LeaderboardResponse>(client, &board_url),
            fetch_json::<AlertsResponse>(client, &alerts_url),
            fetch_json::<HealthResponse>(client, &health_url),
            fetch_json::<LatencyResponse>(client, &latency_url),
        );

        match board {
            Ok(b) => {
                self.board = b;
                self.status = ConnectionStatus::Connected;
            }
            Err(e) => {
                self.status = ConnectionStatus::Error(e);
                return;
            }
        }
        if let Ok(a) = alerts {
            self.alerts = a;
        }
        if let Ok(h) = health {
            self.health = h;
        }
        if let Ok(l) = latency {
            self.latency = l;
        }
    }
}

async fn fetch_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, String> {
    let resp = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(|e| e.to_string())?;
    resp.json::<T>().await.map_err(|e| format!("parse error: {e}"))
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

pub fn format_change(pct: f64) -> String {
    format!("{pct:+.2}%")
}

/// 1234567 -> "1.23M".
pub fn format_compact(v: f64) -> String {
    let abs = v.abs();
    if abs >= 1e9 {
        format!("{:.2}B", v / 1e9)
    } else if abs >= 1e6 {
        format!("{:.2}M", v / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", v / 1e3)
    } else {
        format!("{v:.2}")
    }
}

/// Keeps more decimals for sub-dollar prices.
pub fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) if p >= 1000.0 => format!("{p:.1}"),
        Some(p) if p >= 1.0 => format!("{p:.3}"),
        Some(p) => format!("{p:.6}"),
        None => "—".to_string(),
    }
}

pub fn format_latency(ms: Option<f64>) -> String {
    match ms {
        Some(d) if d >= 1000.0 => format!("{:.1}s", d / 1000.0),
        Some(d) => format!("{d:.0}ms"),
        None => "—".to_string(),
    }
}

pub fn format_time(t: &DateTime<Local>) -> String {
    t.format("%H:%M:%S").to_string()
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{head}…")
    }
}
