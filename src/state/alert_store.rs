//! Persisted record of when each alert key was last sent.
//!
//! The file is a single JSON object mapping keys to RFC 3339 timestamps. It is
//! read once when the store opens and rewritten in full after every send. A
//! missing or unreadable file yields an empty store; a failed write is logged
//! and the in-memory state still advances.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use tracing::{info, warn};

use crate::error::{AppError, Result};

/// Key used to gate batch messages as a whole.
pub const BATCH_KEY: &str = "__batch__";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownPolicy {
    /// A key is alerted at most once for the lifetime of the history file.
    Once,
    /// A key may be re-alerted once this much time has passed.
    Window(Duration),
}

impl CooldownPolicy {
    pub fn minutes(m: i64) -> Self {
        CooldownPolicy::Window(Duration::minutes(m))
    }

    /// Accepts a number of minutes (`0` disables the cooldown) or `once`.
    pub fn parse(s: &str) -> std::result::Result<Self, String> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("once") || s.eq_ignore_ascii_case("never") {
            return Ok(CooldownPolicy::Once);
        }
        match s.parse::<i64>() {
            Ok(m) if (0..=525_600).contains(&m) => Ok(CooldownPolicy::minutes(m)),
            _ => Err(format!(
                "ALERT_COOLDOWN_MINUTES must be 0..=525600 or 'once' (got '{s}')"
            )),
        }
    }

    fn allows(&self, last: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        match self {
            CooldownPolicy::Once => false,
            CooldownPolicy::Window(window) => now - last >= *window,
        }
    }
}

impl std::fmt::Display for CooldownPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CooldownPolicy::Once => write!(f, "once"),
            CooldownPolicy::Window(w) => write!(f, "{}m", w.num_minutes()),
        }
    }
}

/// How the history file looked when the store opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryLoad {
    /// File parsed; this many records kept.
    Loaded(usize),
    Missing,
    /// Unreadable or not a JSON object. The store starts empty.
    Corrupt(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Written,
    Failed,
}

pub struct AlertCooldownStore {
    path: PathBuf,
    cooldown: CooldownPolicy,
    records: HashMap<String, DateTime<Utc>>,
}

impl AlertCooldownStore {
    /// Open the store backed by `path`. Never fails: anything unreadable is
    /// reported through `HistoryLoad` and the store starts empty.
    pub fn open(path: impl Into<PathBuf>, cooldown: CooldownPolicy) -> (Self, HistoryLoad) {
        let path = path.into();
        let (records, load) = load_history(&path);
        match &load {
            HistoryLoad::Loaded(n) => {
                info!(path = %path.display(), records = n, "Alert history loaded ({n} records)")
            }
            HistoryLoad::Missing => {
                info!(path = %path.display(), "No alert history file, starting empty")
            }
            HistoryLoad::Corrupt(reason) => warn!(
                path = %path.display(),
                "Alert history unreadable, starting empty: {reason}"
            ),
        }
        (Self { path, cooldown, records }, load)
    }

    /// True iff `key` has never been sent or its cooldown has elapsed at `now`.
    pub fn should_send(&self, key: &str, now: DateTime<Utc>) -> bool {
        match self.records.get(key) {
            None => true,
            Some(last) => self.cooldown.allows(*last, now),
        }
    }

    /// Upsert the send time for `key` and rewrite the file.
    pub fn record_sent(&mut self, key: &str, now: DateTime<Utc>) -> PersistOutcome {
        self.records.insert(key.to_string(), now);
        self.persist_logged()
    }

    /// Upsert several keys with a single file rewrite.
    pub fn record_many<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a str>,
        now: DateTime<Utc>,
    ) -> PersistOutcome {
        for key in keys {
            self.records.insert(key.to_string(), now);
        }
        self.persist_logged()
    }

    /// All records, newest first; ties ordered by key.
    pub fn entries(&self) -> Vec<(String, DateTime<Utc>)> {
        let mut out: Vec<_> = self
            .records
            .iter()
            .map(|(k, t)| (k.clone(), *t))
            .collect();
        out.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn cooldown(&self) -> CooldownPolicy {
        self.cooldown
    }

    fn persist_logged(&self) -> PersistOutcome {
        match self.persist() {
            Ok(()) => PersistOutcome::Written,
            Err(e) => {
                warn!(path = %self.path.display(), "Alert history write failed: {e}");
                PersistOutcome::Failed
            }
        }
    }

    /// Whole-file rewrite through a sibling `.tmp` file, then rename.
    fn persist(&self) -> Result<()> {
        let sorted: BTreeMap<&str, String> = self
            .records
            .iter()
            .map(|(k, t)| (k.as_str(), t.to_rfc3339_opts(SecondsFormat::Micros, true)))
            .collect();
        let body = serde_json::to_string_pretty(&sorted)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path).map_err(AppError::Io)
    }
}

#[cfg(test)]
impl AlertCooldownStore {
    pub fn last_sent(&self, key: &str) -> Option<DateTime<Utc>> {
        self.records.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn load_history(path: &Path) -> (HashMap<String, DateTime<Utc>>, HistoryLoad) {
    let raw = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return (HashMap::new(), HistoryLoad::Missing)
        }
        Err(e) => return (HashMap::new(), HistoryLoad::Corrupt(e.to_string())),
    };

    if raw.trim().is_empty() {
        return (HashMap::new(), HistoryLoad::Corrupt("empty file".to_string()));
    }

    let value: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(e) => return (HashMap::new(), HistoryLoad::Corrupt(e.to_string())),
    };
    let Some(obj) = value.as_object() else {
        return (
            HashMap::new(),
            HistoryLoad::Corrupt("top-level value is not an object".to_string()),
        );
    };

    let mut records = HashMap::with_capacity(obj.len());
    for (key, v) in obj {
        match v.as_str().and_then(parse_timestamp) {
            Some(ts) => {
                records.insert(key.clone(), ts);
            }
            None => warn!(key = %key, "Dropping alert record with unreadable timestamp: {v}"),
        }
    }
    let n = records.len();
    (records, HistoryLoad::Loaded(n))
}

/// RFC 3339, or a naive ISO-8601 datetime taken as UTC.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
