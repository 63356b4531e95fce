use std::sync::Arc;

use axum::{
    extract::{Query, State},
    response::Html,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::api::health::HealthReport;
use crate::api::latency::LatencyReport;
use crate::error::AppError;
use crate::state::dashboard::{AlertHistoryView, Leaderboard};
use crate::state::DashboardState;
use crate::types::{Grade, ScoredRow};

#[derive(Clone)]
pub struct ApiState {
    pub state: Arc<DashboardState>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/leaderboard", get(get_leaderboard))
        .route("/api/alerts", get(get_alerts))
        .route("/health", get(get_health))
        .route("/stats/latency", get(get_stats_latency))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// Keep rows at or above this grade ("A+", "A", "B", "C").
    pub min_grade: Option<String>,
    pub limit: Option<usize>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn index() -> Html<&'static str> {
    Html(include_str!("../../static/dashboard.html"))
}

async fn get_leaderboard(
    State(api): State<ApiState>,
    Query(params): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>, AppError> {
    let min_grade = params
        .min_grade
        .as_deref()
        .map(str::parse::<Grade>)
        .transpose()
        .map_err(AppError::BadRequest)?;

    let mut board = api.state.leaderboard();
    board.rows = filter_rows(board.rows, min_grade, params.limit);
    Ok(Json(board))
}

async fn get_alerts(State(api): State<ApiState>) -> Json<AlertHistoryView> {
    Json(api.state.alert_history())
}

async fn get_health(State(api): State<ApiState>) -> Json<HealthReport> {
    Json(api.state.health.report())
}

async fn get_stats_latency(State(api): State<ApiState>) -> Json<LatencyReport> {
    Json(api.state.latency.report())
}

/// Rows are already ranked, so filtering keeps order and ranks intact.
fn filter_rows(rows: Vec<ScoredRow>, min_grade: Option<Grade>, limit: Option<usize>) -> Vec<ScoredRow> {
    rows.into_iter()
        .filter(|r| min_grade.map_or(true, |g| r.grade >= g))
        .take(limit.unwrap_or(usize::MAX))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(rank: usize, symbol: &str, grade: Grade) -> ScoredRow {
        ScoredRow {
            rank,
            symbol: symbol.to_string(),
            change_pct: 1.0,
            size: 100.0,
            secondary_size: None,
            last_price: None,
            lag_ratio: 50.0,
            score: 50.0,
            grade,
            direction: None,
            priority: None,
        }
    }

    fn board() -> Vec<ScoredRow> {
        vec![
            row(1, "AUSDT", Grade::APlus),
            row(2, "BUSDT", Grade::A),
            row(3, "CUSDT", Grade::B),
            row(4, "DUSDT", Grade::C),
        ]
    }

    #[test]
    fn no_filter_returns_everything() {
        assert_eq!(filter_rows(board(), None, None).len(), 4);
    }

    #[test]
    fn min_grade_keeps_grade_and_above() {
        let rows = filter_rows(board(), Some(Grade::A), None);
        let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AUSDT", "BUSDT"]);
        assert_eq!(rows[1].rank, 2);
    }

    #[test]
    fn limit_applies_after_grade_filter() {
        let rows = filter_rows(board(), Some(Grade::B), Some(2));
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].symbol, "AUSDT");
        assert!(filter_rows(board(), None, Some(0)).is_empty());
    }
}
