use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Ticker input
// ---------------------------------------------------------------------------

/// One parsed entry from the 24h ticker list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerEntry {
    pub symbol: String,
    /// Signed 24h price change in percent.
    pub change_pct: f64,
    /// Primary size measure (quote volume by default).
    pub size: f64,
    /// Optional second size measure, carried for display only.
    pub secondary_size: Option<f64>,
    pub last_price: Option<f64>,
}

impl TickerEntry {
    /// Size per unit of smoothed price movement. The `+ 1` keeps near-zero
    /// moves from blowing the ratio up.
    pub fn lag_ratio(&self) -> f64 {
        self.size / (self.change_pct.abs() + 1.0)
    }
}

/// Current quote for the reference asset (BTCUSDT by default).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceQuote {
    pub symbol: String,
    pub last_price: f64,
    pub change_pct: f64,
}

// ---------------------------------------------------------------------------
// Grade
// ---------------------------------------------------------------------------

/// Declaration order is rank order: `C < B < A < APlus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    C,
    B,
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    pub fn from_score(score: f64, thresholds: &GradeThresholds) -> Self {
        if score >= thresholds.a_plus {
            Grade::APlus
        } else if score >= thresholds.a {
            Grade::A
        } else if score >= thresholds.b {
            Grade::B
        } else {
            Grade::C
        }
    }

    /// True for grades that survive the unscored cut.
    pub fn is_scored(self) -> bool {
        self >= Grade::B
    }
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A+" | "APLUS" => Ok(Grade::APlus),
            "A" => Ok(Grade::A),
            "B" => Ok(Grade::B),
            "C" => Ok(Grade::C),
            other => Err(format!("unknown grade '{other}'")),
        }
    }
}

/// Lower bounds (inclusive) of each grade on the 0–100 score scale.
/// Everything below `b` grades `C`, so the buckets cover [0, 100] with no gaps.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradeThresholds {
    pub a_plus: f64,
    pub a: f64,
    pub b: f64,
}

impl GradeThresholds {
    pub fn new(a_plus: f64, a: f64, b: f64) -> std::result::Result<Self, String> {
        let t = Self { a_plus, a, b };
        t.validate()?;
        Ok(t)
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        let in_range = |v: f64| v.is_finite() && (0.0..=100.0).contains(&v);
        if !(in_range(self.a_plus) && in_range(self.a) && in_range(self.b)) {
            return Err(format!(
                "grade breakpoints must lie in [0, 100] (got A+={} A={} B={})",
                self.a_plus, self.a, self.b
            ));
        }
        if !(self.a_plus > self.a && self.a > self.b) {
            return Err(format!(
                "grade breakpoints must be strictly descending (got A+={} A={} B={})",
                self.a_plus, self.a, self.b
            ));
        }
        Ok(())
    }
}

impl Default for GradeThresholds {
    fn default() -> Self {
        Self {
            a_plus: 80.0,
            a: 60.0,
            b: 40.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Direction / regime
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Direction {
    Long,
    Short,
    Misaligned,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Direction::Long => "LONG",
            Direction::Short => "SHORT",
            Direction::Misaligned => "MISALIGNED",
        };
        write!(f, "{s}")
    }
}

/// Coarse classification of the reference asset's 24h move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Regime {
    /// Reference change above `+band`.
    RiskOn,
    /// Reference change below `-band`.
    RiskOff,
    /// Inside the band.
    Ranging,
}

impl std::fmt::Display for Regime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Regime::RiskOn => "risk_on",
            Regime::RiskOff => "risk_off",
            Regime::Ranging => "ranging",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Primary,
    Secondary,
}

// ---------------------------------------------------------------------------
// Scored output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredRow {
    /// 1-based position after sorting.
    pub rank: usize,
    pub symbol: String,
    pub change_pct: f64,
    pub last_price: Option<f64>,
    pub size: f64,
    pub secondary_size: Option<f64>,
    pub lag_ratio: f64,
    /// Min-max normalized lag ratio, in [0, 100].
    pub score: f64,
    pub grade: Grade,
    pub direction: Option<Direction>,
    pub priority: Option<Priority>,
}

/// Result of one build pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub rows: Vec<ScoredRow>,
    /// Entries in the upstream payload.
    pub received: usize,
    /// Entries that parsed and passed the quote-asset filter.
    pub parsed: usize,
    pub regime: Option<Regime>,
}

/// What one refresh tick produced. `Unavailable` means no data this tick,
/// not a failure to propagate.
#[derive(Debug, Clone)]
pub enum SnapshotOutcome {
    Ready(Snapshot),
    Unavailable(String),
}
