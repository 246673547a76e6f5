//! Presence Event Logger
//!
//! Structured presence events (join, leave, sweep) emitted on the
//! `presence_events` target so they can be routed to the NDJSON file.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    Joined {
        community: String,
        member: String,
        online: u64,
    },
    Left {
        community: String,
        member: String,
        online: u64,
    },
    Swept {
        communities: u64,
        removed: u64,
    },
}

#[derive(Debug, Serialize)]
pub struct EventLogEntry {
    pub timestamp: DateTime<Utc>,
    pub event: PresenceEvent,
}

pub struct EventLogger;

impl EventLogger {
    pub fn entry(event: PresenceEvent) -> EventLogEntry {
        EventLogEntry { timestamp: Utc::now(), event }
    }

    /// Emit a presence event as a single structured log line.
    pub fn log_event(event: PresenceEvent) {
        let entry = Self::entry(event);
        let payload = serde_json::to_string(&entry).unwrap_or_default();
        info!(target: "presence_events", event = %payload, "Presence event");
    }
}
