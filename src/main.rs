mod api;
mod config;
mod detector;
mod error;
mod fetcher;
mod market_refresh;
mod notifier;
mod scorer;
mod state;
mod types;

use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::routes::{router, ApiState};
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::MarketDataClient;
use crate::market_refresh::{RefreshSettings, SnapshotRefresher};
use crate::notifier::{AlertDispatcher, TelegramNotifier};
use crate::state::{AlertCooldownStore, DashboardState, SystemClock};

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    let timeout = Duration::from_secs(cfg.request_timeout_secs);
    let state = DashboardState::new(cfg.notifications_enabled());

    info!(
        "Scanner starting: reference={} quote={} size_field={} every {}s, top {}",
        cfg.reference_symbol,
        cfg.scoring.quote_asset,
        cfg.scoring.size_field,
        cfg.refresh_interval_secs,
        cfg.leaderboard_size,
    );

    // --- Alerting (optional) ---
    let dispatcher = match (&cfg.telegram_bot_token, &cfg.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            let (store, _) =
                AlertCooldownStore::open(&cfg.alerts.history_path, cfg.alerts.cooldown);
            let notifier =
                TelegramNotifier::new(&cfg.telegram_api_url, token, chat_id, timeout)?;
            info!(
                "Telegram alerts on: min_grade={} mode={:?} cooldown={}",
                cfg.alerts.rule.min_grade, cfg.alerts.mode, cfg.alerts.cooldown,
            );
            Some(AlertDispatcher::new(
                store,
                notifier,
                SystemClock,
                cfg.alerts.rule.clone(),
                cfg.alerts.mode,
            ))
        }
        _ => {
            warn!("TELEGRAM_BOT_TOKEN / TELEGRAM_CHAT_ID not set: notifications disabled, dashboard only");
            None
        }
    };

    // --- Refresh loop ---
    let market = MarketDataClient::new(&cfg.binance_url, timeout)?;
    let refresher: SnapshotRefresher<TelegramNotifier, SystemClock> = SnapshotRefresher::new(
        RefreshSettings::from_config(&cfg),
        market,
        state.clone(),
        dispatcher,
    );
    tokio::spawn(async move { refresher.run().await });

    // --- HTTP API server ---
    let app = router(ApiState { state });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("Dashboard listening on http://{bind_addr}");

    axum::serve(listener, app).await?;

    Ok(())
}
