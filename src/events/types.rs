use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SnapshotError};

/// A named collection of modules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

/// A physical device in a home, as reported by home status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Module {
    pub id: String,
    #[serde(rename = "type")]
    pub module_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Local streaming URL of camera modules.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vpn_url: Option<String>,
}

/// A timestamped occurrence reported by a module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub id: Option<String>,
    pub module_id: String,
    pub event_type: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub subevents: Vec<Subevent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subevent {
    pub timestamp: DateTime<Utc>,
    pub snapshot_url: Option<String>,
}

/// A downloadable snapshot selected by the event filter.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SnapshotReference {
    pub timestamp: DateTime<Utc>,
    pub url: String,
    pub module_id: String,
}

// ── Wire format ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub body: T,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HomesBody {
    #[serde(default)]
    pub homes: Vec<Home>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HomeStatusBody {
    pub home: HomeStatus,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HomeStatus {
    #[serde(default)]
    pub modules: Vec<Module>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsBody {
    pub home: EventsHome,
}

#[derive(Debug, Deserialize)]
pub(crate) struct EventsHome {
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawEvent {
    #[serde(default)]
    pub id: Option<String>,
    pub module_id: String,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub subevents: Vec<RawSubevent>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSubevent {
    #[serde(default)]
    pub time: Option<i64>,
    #[serde(default)]
    pub snapshot: Option<RawSnapshot>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSnapshot {
    #[serde(default)]
    pub url: Option<String>,
}

fn from_unix(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| SnapshotError::Decode(format!("timestamp out of range: {secs}")))
}

impl TryFrom<RawEvent> for Event {
    type Error = SnapshotError;

    fn try_from(raw: RawEvent) -> Result<Self> {
        let time = raw
            .time
            .ok_or_else(|| SnapshotError::Decode(format!("event without time from {}", raw.module_id)))?;
        let timestamp = from_unix(time)?;
        let subevents = raw
            .subevents
            .into_iter()
            .map(|sub| -> Result<Subevent> {
                Ok(Subevent {
                    // Some payloads only carry the parent event time.
                    timestamp: sub.time.map(from_unix).transpose()?.unwrap_or(timestamp),
                    snapshot_url: sub
                        .snapshot
                        .and_then(|s| s.url)
                        .filter(|url| !url.is_empty()),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Event {
            id: raw.id,
            module_id: raw.module_id,
            event_type: raw.event_type,
            timestamp,
            subevents,
        })
    }
}
