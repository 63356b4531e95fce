use serde_json::Value;
use tracing::debug;

use crate::config::{ScoringConfig, FLAT_SNAPSHOT_SCORE};
use crate::detector::classifier;
use crate::fetcher::{parse_ticker_checked, Rejection};
use crate::types::{Grade, ScoredRow, Snapshot, TickerEntry};

/// Turn a raw ticker payload into graded rows ranked by apex score.
///
/// Order matters: entries are parsed and filtered first so that the min-max
/// range only covers rows that survive, then scored, labeled, sorted (stable,
/// descending) and finally cut below grade `B` when `drop_unscored` is set.
/// The cut keeps relative order, so doing it after the sort gives the same
/// rows as doing it before.
pub fn build_snapshot(
    entries: &[Value],
    reference_change: Option<f64>,
    cfg: &ScoringConfig,
) -> Snapshot {
    let mut malformed = 0usize;
    let mut other_quote = 0usize;
    let tickers: Vec<TickerEntry> = entries
        .iter()
        .filter_map(|v| match parse_ticker_checked(v, cfg) {
            Ok(t) => Some(t),
            Err(Rejection::Malformed) => {
                malformed += 1;
                None
            }
            Err(Rejection::QuoteAsset) => {
                other_quote += 1;
                None
            }
        })
        .collect();

    if malformed > 0 {
        debug!(malformed, "Skipped {malformed} malformed ticker entries");
    }

    let lags: Vec<f64> = tickers.iter().map(TickerEntry::lag_ratio).collect();
    let scores = normalize(&lags);
    let regime = reference_change.map(|c| classifier::regime(c, cfg.regime_band_pct));

    let mut rows: Vec<ScoredRow> = tickers
        .into_iter()
        .zip(lags)
        .zip(scores)
        .map(|((t, lag_ratio), score)| {
            let direction = reference_change.map(|r| classifier::direction(t.change_pct, r));
            let priority = regime.zip(direction).map(|(g, d)| classifier::priority(g, d));
            ScoredRow {
                rank: 0,
                symbol: t.symbol,
                change_pct: t.change_pct,
                last_price: t.last_price,
                size: t.size,
                secondary_size: t.secondary_size,
                lag_ratio,
                score,
                grade: Grade::from_score(score, &cfg.thresholds),
                direction,
                priority,
            }
        })
        .collect();

    let parsed = rows.len();

    rows.sort_by(|a, b| b.score.total_cmp(&a.score));
    if cfg.drop_unscored {
        rows.retain(|r| r.grade.is_scored());
    }
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }

    debug!(
        received = entries.len(),
        parsed,
        other_quote,
        kept = rows.len(),
        "Snapshot built"
    );

    Snapshot {
        rows,
        received: entries.len(),
        parsed,
        regime,
    }
}

/// Min-max scale to [0, 100]. A flat input (including a single value) maps
/// every element to `FLAT_SNAPSHOT_SCORE`.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    let (min, max) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = max - min;
    if !(range.is_finite() && range > 0.0) {
        return vec![FLAT_SNAPSHOT_SCORE; values.len()];
    }
    values
        .iter()
        .map(|v| ((v - min) / range * 100.0).clamp(0.0, 100.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Direction, GradeThresholds, Priority, Regime};
    use serde_json::json;

    fn ticker(symbol: &str, change: f64, size: f64) -> Value {
        json!({
            "symbol": symbol,
            "priceChangePercent": change.to_string(),
            "quoteVolume": size.to_string(),
        })
    }

    fn keep_all() -> ScoringConfig {
        ScoringConfig {
            drop_unscored: false,
            ..ScoringConfig::default()
        }
    }

    #[test]
    fn two_row_scenario() {
        let entries = vec![ticker("BTCUSDT", 5.0, 1000.0), ticker("ETHUSDT", 1.0, 1000.0)];

        let all = build_snapshot(&entries, None, &keep_all());
        assert_eq!(all.rows.len(), 2);
        assert_eq!(all.rows[0].symbol, "ETHUSDT");
        assert_eq!(all.rows[0].score, 100.0);
        assert_eq!(all.rows[0].grade, Grade::APlus);
        assert!((all.rows[0].lag_ratio - 500.0).abs() < 1e-9);
        assert_eq!(all.rows[1].symbol, "BTCUSDT");
        assert_eq!(all.rows[1].score, 0.0);
        assert_eq!(all.rows[1].grade, Grade::C);
        assert!((all.rows[1].lag_ratio - 1000.0 / 6.0).abs() < 1e-9);

        let kept = build_snapshot(&entries, None, &ScoringConfig::default());
        assert_eq!(kept.rows.len(), 1);
        assert_eq!(kept.rows[0].symbol, "ETHUSDT");
        assert_eq!(kept.rows[0].rank, 1);
        assert_eq!(kept.parsed, 2);
    }

    #[test]
    fn last_price_is_carried_to_rows() {
        let entries = vec![json!({
            "symbol": "ETHUSDT",
            "priceChangePercent": "1",
            "quoteVolume": "1000",
            "lastPrice": "3120.55"
        })];
        let snap = build_snapshot(&entries, None, &keep_all());
        assert_eq!(snap.rows[0].last_price, Some(3120.55));
    }

    #[test]
    fn flat_snapshot_scores_fallback() {
        let entries = vec![
            ticker("AUSDT", 1.0, 200.0),
            ticker("BUSDT", -1.0, 200.0),
            ticker("CUSDT", 3.0, 400.0),
        ];
        let snap = build_snapshot(&entries, None, &keep_all());
        assert!(snap.rows.iter().all(|r| r.score == FLAT_SNAPSHOT_SCORE));
        // 50 is grade B under the canonical breakpoints, so nothing is dropped.
        let kept = build_snapshot(&entries, None, &ScoringConfig::default());
        assert_eq!(kept.rows.len(), 3);
    }

    #[test]
    fn single_row_scores_fallback() {
        let snap = build_snapshot(&[ticker("ETHUSDT", 0.0, 10.0)], None, &keep_all());
        assert_eq!(snap.rows.len(), 1);
        assert_eq!(snap.rows[0].score, FLAT_SNAPSHOT_SCORE);
    }

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let entries = vec![
            ticker("ETHUSDT", 1.0, 1000.0),
            json!({"symbol": "BADUSDT", "priceChangePercent": "x", "quoteVolume": "1"}),
            json!(null),
            ticker("ETHBTC", 1.0, 1_000_000.0),
            ticker("SOLUSDT", 4.0, 1000.0),
        ];
        let snap = build_snapshot(&entries, None, &keep_all());
        assert_eq!(snap.received, 5);
        assert_eq!(snap.parsed, 2);
        // ETHBTC is excluded before normalization, so it cannot stretch the range.
        assert_eq!(snap.rows[0].symbol, "ETHUSDT");
        assert_eq!(snap.rows[0].score, 100.0);
    }

    #[test]
    fn all_unparseable_is_empty() {
        let snap = build_snapshot(&[json!({}), json!([])], None, &ScoringConfig::default());
        assert!(snap.rows.is_empty());
        assert_eq!(snap.parsed, 0);
        assert_eq!(snap.received, 2);
    }

    #[test]
    fn scores_stay_in_range() {
        let entries: Vec<Value> = (0..50)
            .map(|i| ticker(&format!("S{i}USDT"), (i as f64) * 0.37 - 9.0, 10.0 + (i * i) as f64))
            .collect();
        let snap = build_snapshot(&entries, None, &keep_all());
        assert_eq!(snap.rows.len(), 50);
        assert!(snap.rows.iter().all(|r| (0.0..=100.0).contains(&r.score)));
        assert!(snap.rows.iter().any(|r| r.score == 100.0));
        assert!(snap.rows.iter().any(|r| r.score == 0.0));
    }

    #[test]
    fn sort_is_stable_and_descending() {
        let entries = vec![
            ticker("LOWUSDT", 9.0, 100.0),
            ticker("TIE1USDT", 1.0, 1000.0),
            ticker("MIDUSDT", 1.0, 600.0),
            ticker("TIE2USDT", 1.0, 1000.0),
            ticker("TIE3USDT", 1.0, 1000.0),
        ];
        let snap = build_snapshot(&entries, None, &keep_all());
        let order: Vec<&str> = snap.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["TIE1USDT", "TIE2USDT", "TIE3USDT", "MIDUSDT", "LOWUSDT"]);
        assert!(snap.rows.windows(2).all(|w| w[0].score >= w[1].score));
        let ranks: Vec<usize> = snap.rows.iter().map(|r| r.rank).collect();
        assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn grade_is_monotonic_in_score() {
        let entries: Vec<Value> = (0..40)
            .map(|i| ticker(&format!("S{i}USDT"), 0.0, (i * 7 % 40) as f64))
            .collect();
        let snap = build_snapshot(&entries, None, &keep_all());
        assert!(snap.rows.windows(2).all(|w| w[0].grade >= w[1].grade));
    }

    #[test]
    fn breakpoints_are_configurable() {
        let cfg = ScoringConfig {
            thresholds: GradeThresholds::new(85.0, 70.0, 55.0).unwrap(),
            drop_unscored: false,
            ..ScoringConfig::default()
        };
        // Lags 0, 50, 75, 82, 100 over a 0..100 range.
        let entries = vec![
            ticker("AUSDT", 0.0, 0.0),
            ticker("BUSDT", 0.0, 50.0),
            ticker("CUSDT", 0.0, 75.0),
            ticker("DUSDT", 0.0, 82.0),
            ticker("EUSDT", 0.0, 100.0),
        ];
        let snap = build_snapshot(&entries, None, &cfg);
        let grades: Vec<Grade> = snap.rows.iter().map(|r| r.grade).collect();
        assert_eq!(grades, vec![Grade::APlus, Grade::A, Grade::A, Grade::C, Grade::C]);
    }

    #[test]
    fn direction_and_priority_follow_reference() {
        let entries = vec![
            ticker("UPUSDT", 2.0, 1000.0),
            ticker("DOWNUSDT", -2.0, 900.0),
        ];
        let snap = build_snapshot(&entries, Some(3.0), &keep_all());
        assert_eq!(snap.regime, Some(Regime::RiskOn));
        let up = snap.rows.iter().find(|r| r.symbol == "UPUSDT").unwrap();
        let down = snap.rows.iter().find(|r| r.symbol == "DOWNUSDT").unwrap();
        assert_eq!(up.direction, Some(Direction::Long));
        assert_eq!(up.priority, Some(Priority::Primary));
        assert_eq!(down.direction, Some(Direction::Misaligned));
        assert_eq!(down.priority, Some(Priority::Secondary));

        let no_ref = build_snapshot(&entries, None, &keep_all());
        assert!(no_ref.rows.iter().all(|r| r.direction.is_none() && r.priority.is_none()));
        assert_eq!(no_ref.regime, None);
    }

    #[test]
    fn normalize_handles_empty_input() {
        assert!(normalize(&[]).is_empty());
        assert_eq!(normalize(&[3.0, 3.0]), vec![50.0, 50.0]);
        assert_eq!(normalize(&[0.0, 5.0, 10.0]), vec![0.0, 50.0, 100.0]);
    }
}
