use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::time::Duration;

use crate::error::{Result, SnapshotError};

/// Which events to keep, by time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeWindow {
    /// Everything from `now - duration` onwards.
    LookBack(Duration),
    /// Both bounds inclusive.
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
}

/// A window pinned to absolute instants. `to == None` is unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedWindow {
    pub from: DateTime<Utc>,
    pub to: Option<DateTime<Utc>>,
}

impl ResolvedWindow {
    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.from <= t && self.to.map_or(true, |to| t <= to)
    }
}

impl TimeWindow {
    pub fn between(from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Self> {
        let window = TimeWindow::Between { from, to };
        window.validate()?;
        Ok(window)
    }

    /// Build a window from optional command line parts.
    ///
    /// The relative and explicit forms are mutually exclusive.
    pub fn from_parts(
        look_back: Option<Duration>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        match (look_back, from, to) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => Err(SnapshotError::Config(
                "a look-back duration and an explicit from/to range cannot be combined".into(),
            )),
            (Some(d), None, None) => Ok(TimeWindow::LookBack(d)),
            (None, Some(from), Some(to)) => TimeWindow::between(from, to),
            (None, Some(_), None) | (None, None, Some(_)) => Err(SnapshotError::Config(
                "an explicit range needs both from and to".into(),
            )),
            (None, None, None) => Err(SnapshotError::Config("no time window given".into())),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            TimeWindow::Between { from, to } if to < from => Err(SnapshotError::Config(format!(
                "time window ends ({to}) before it starts ({from})"
            ))),
            _ => Ok(()),
        }
    }

    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ResolvedWindow> {
        self.validate()?;
        match *self {
            TimeWindow::LookBack(d) => {
                let d = ChronoDuration::from_std(d)
                    .map_err(|_| SnapshotError::Config(format!("look-back too large: {d:?}")))?;
                let from = now
                    .checked_sub_signed(d)
                    .ok_or_else(|| SnapshotError::Config("look-back too large".into()))?;
                Ok(ResolvedWindow { from, to: None })
            }
            TimeWindow::Between { from, to } => Ok(ResolvedWindow { from, to: Some(to) }),
        }
    }
}

/// Parse an RFC 3339 timestamp or unix seconds.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(secs) = raw.parse::<i64>() {
        return DateTime::from_timestamp(secs, 0)
            .ok_or_else(|| SnapshotError::Config(format!("timestamp out of range: {raw}")));
    }
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| SnapshotError::Config(format!("invalid timestamp {raw:?}: {e}")))
}
