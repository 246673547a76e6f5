//! `pulse-presence`: who is online in which community.
//!
//! [`PresenceTracker`] keeps, per community, the set of online members,
//! per-member activity records, a member → communities reverse index, peak
//! counters per calendar window, and a short-lived analytics snapshot, all in
//! an expiring store behind [`pulse_core::PresenceStore`].

mod cleanup;
mod peaks;
mod snapshot;
pub mod tracker;

pub use tracker::{Clock, PresenceTracker};
