use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::notifier::dispatcher::{AlertMode, AlertRule};
use crate::state::alert_store::CooldownPolicy;
use crate::types::{Grade, GradeThresholds};

pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org";

/// 24h ticker list; with `?symbol=` it returns a single object.
pub const TICKER_24H_PATH: &str = "/fapi/v1/ticker/24hr";

pub const DEFAULT_REFERENCE_SYMBOL: &str = "BTCUSDT";
pub const DEFAULT_QUOTE_ASSET: &str = "USDT";
pub const DEFAULT_SIZE_FIELD: &str = "quoteVolume";
pub const DEFAULT_SECONDARY_SIZE_FIELD: &str = "volume";
pub const DEFAULT_ALERT_FILE: &str = "alerted_symbols.json";

/// Refresh tick interval (seconds).
pub const REFRESH_INTERVAL_SECS: u64 = 15;

/// Per-request timeout for upstream and Telegram calls (seconds).
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Rows shown on the dashboard and considered for alerts.
pub const LEADERBOARD_SIZE: usize = 25;

pub const ALERT_COOLDOWN_MINUTES: i64 = 60;

/// Score assigned to every row when all lag ratios in a snapshot are equal.
pub const FLAT_SNAPSHOT_SCORE: f64 = 50.0;

/// Reference moves inside ±band (percent) classify as ranging.
pub const REGIME_BAND_PCT: f64 = 1.0;

/// Everything the snapshot builder needs besides the raw payload.
#[derive(Debug, Clone)]
pub struct ScoringConfig {
    /// Only symbols ending in this suffix are scored.
    pub quote_asset: String,
    pub size_field: String,
    pub secondary_size_field: Option<String>,
    pub thresholds: GradeThresholds,
    /// Remove rows graded below `B` from the result.
    pub drop_unscored: bool,
    pub regime_band_pct: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            quote_asset: DEFAULT_QUOTE_ASSET.to_string(),
            size_field: DEFAULT_SIZE_FIELD.to_string(),
            secondary_size_field: Some(DEFAULT_SECONDARY_SIZE_FIELD.to_string()),
            thresholds: GradeThresholds::default(),
            drop_unscored: true,
            regime_band_pct: REGIME_BAND_PCT,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub rule: AlertRule,
    pub mode: AlertMode,
    pub cooldown: CooldownPolicy,
    pub history_path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub binance_url: String,
    pub telegram_api_url: String,
    /// Notifications are disabled unless both token and chat id are set.
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub reference_symbol: String,
    pub log_level: String,
    pub api_port: u16,
    pub refresh_interval_secs: u64,
    pub request_timeout_secs: u64,
    pub leaderboard_size: usize,
    pub scoring: ScoringConfig,
    pub alerts: AlertConfig,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key → value source. Unset keys take their defaults;
    /// set but invalid values are `AppError::Config`.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let thresholds = GradeThresholds::new(
            env_f64(&get, "GRADE_A_PLUS", 80.0)?,
            env_f64(&get, "GRADE_A", 60.0)?,
            env_f64(&get, "GRADE_B", 40.0)?,
        )
        .map_err(AppError::Config)?;

        let scoring = ScoringConfig {
            quote_asset: get("QUOTE_ASSET").unwrap_or_else(|| DEFAULT_QUOTE_ASSET.to_string()),
            size_field: get("SIZE_FIELD").unwrap_or_else(|| DEFAULT_SIZE_FIELD.to_string()),
            secondary_size_field: match get("SECONDARY_SIZE_FIELD") {
                Some(v) if v.trim().is_empty() => None,
                Some(v) => Some(v.trim().to_string()),
                None => Some(DEFAULT_SECONDARY_SIZE_FIELD.to_string()),
            },
            thresholds,
            drop_unscored: env_bool(&get, "DROP_UNSCORED", true)?,
            regime_band_pct: env_f64(&get, "REGIME_BAND_PCT", REGIME_BAND_PCT)?,
        };

        let min_grade = match get("ALERT_MIN_GRADE") {
            Some(v) => v
                .parse::<Grade>()
                .map_err(|e| AppError::Config(format!("ALERT_MIN_GRADE: {e}")))?,
            None => Grade::APlus,
        };
        let min_score = match get("ALERT_MIN_SCORE") {
            Some(v) if !v.trim().is_empty() => Some(v.trim().parse::<f64>().map_err(|_| {
                AppError::Config("ALERT_MIN_SCORE must be a number".to_string())
            })?),
            _ => None,
        };
        let mode = match get("ALERT_MODE") {
            Some(v) => v.parse::<AlertMode>().map_err(AppError::Config)?,
            None => AlertMode::PerSymbol,
        };
        let cooldown = match get("ALERT_COOLDOWN_MINUTES") {
            Some(v) => CooldownPolicy::parse(&v).map_err(AppError::Config)?,
            None => CooldownPolicy::minutes(ALERT_COOLDOWN_MINUTES),
        };

        let alerts = AlertConfig {
            rule: AlertRule {
                min_grade,
                min_score,
                skip_misaligned: env_bool(&get, "ALERT_SKIP_MISALIGNED", false)?,
            },
            mode,
            cooldown,
            history_path: PathBuf::from(
                get("ALERT_FILE").unwrap_or_else(|| DEFAULT_ALERT_FILE.to_string()),
            ),
        };

        Ok(Self {
            binance_url: get("BINANCE_FUTURES_URL")
                .unwrap_or_else(|| BINANCE_FUTURES_URL.to_string()),
            telegram_api_url: get("TELEGRAM_API_URL")
                .unwrap_or_else(|| TELEGRAM_API_URL.to_string()),
            telegram_bot_token: non_empty(&get, "TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: non_empty(&get, "TELEGRAM_CHAT_ID"),
            reference_symbol: get("REFERENCE_SYMBOL")
                .unwrap_or_else(|| DEFAULT_REFERENCE_SYMBOL.to_string()),
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            api_port: get("API_PORT")
                .unwrap_or_else(|| "3000".to_string())
                .trim()
                .parse::<u16>()
                .map_err(|_| AppError::Config("API_PORT must be a valid port number".to_string()))?,
            refresh_interval_secs: env_positive(&get, "REFRESH_INTERVAL_SECS", REFRESH_INTERVAL_SECS)?,
            request_timeout_secs: env_positive(&get, "REQUEST_TIMEOUT_SECS", REQUEST_TIMEOUT_SECS)?,
            leaderboard_size: env_positive(&get, "LEADERBOARD_SIZE", LEADERBOARD_SIZE as u64)?
                as usize,
            scoring,
            alerts,
        })
    }

    pub fn notifications_enabled(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

fn non_empty(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    get(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_f64(get: &impl Fn(&str) -> Option<String>, key: &str, default: f64) -> Result<f64> {
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(|| AppError::Config(format!("{key} must be a finite number"))),
        None => Ok(default),
    }
}

fn env_positive(get: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match get(key) {
        Some(v) => v
            .trim()
            .parse::<u64>()
            .ok()
            .filter(|n| *n > 0)
            .ok_or_else(|| AppError::Config(format!("{key} must be a positive integer (got '{v}')"))),
        None => Ok(default),
    }
}

fn env_bool(get: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match get(key) {
        Some(v) => parse_bool(&v).ok_or_else(|| AppError::Config(format!("{key} must be true or false"))),
        None => Ok(default),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
