//! Structured logging for Pulse.
//!
//! Console + rolling NDJSON output, credential redaction, and the presence
//! event log used by the tracker and maintenance jobs.

pub mod event_logger;
pub mod logger;
pub mod redact;

pub use event_logger::{EventLogEntry, EventLogger, PresenceEvent};
pub use logger::{LogOptions, init_logger};
pub use redact::redact_credentials;
