use crate::types::{Direction, Priority, Regime};

/// Label a row by comparing the sign of its change against the reference.
/// Zero counts as non-negative, so `(0, 0)` is `Long`.
pub fn direction(row_change: f64, reference_change: f64) -> Direction {
    if row_change >= 0.0 && reference_change >= 0.0 {
        Direction::Long
    } else if row_change <= 0.0 && reference_change <= 0.0 {
        Direction::Short
    } else {
        Direction::Misaligned
    }
}

/// Classify the reference move. `band_pct` is inclusive on both edges.
pub fn regime(reference_change: f64, band_pct: f64) -> Regime {
    if reference_change > band_pct {
        Regime::RiskOn
    } else if reference_change < -band_pct {
        Regime::RiskOff
    } else {
        Regime::Ranging
    }
}

/// Rows moving with the regime are primary. In a ranging market any aligned
/// row is primary.
pub fn priority(regime: Regime, direction: Direction) -> Priority {
    match (regime, direction) {
        (_, Direction::Misaligned) => Priority::Secondary,
        (Regime::RiskOn, Direction::Long) => Priority::Primary,
        (Regime::RiskOff, Direction::Short) => Priority::Primary,
        (Regime::Ranging, _) => Priority::Primary,
        _ => Priority::Secondary,
    }
}
