//! Store key layout.
//!
//! ```text
//! {ns}:community:{community}:online                     presence set
//! {ns}:community:{community}:snapshot                   analytics snapshot (JSON)
//! {ns}:community:{community}:peak:{window}:{window_id}  peak counter
//! {ns}:activity:{len}:{member}:{community}              activity record
//! {ns}:member:{member}:communities                      reverse index
//! ```
//!
//! Ids may contain `:`. The activity key carries two of them, so the member
//! is prefixed with its byte length to keep distinct pairs on distinct keys.

use chrono::{DateTime, Utc};

use crate::types::PeakWindow;

const ONLINE_SUFFIX: &str = ":online";

/// Builds every key the tracker touches under one namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySpace {
    namespace: String,
}

impl KeySpace {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self { namespace: namespace.into() }
    }

    /// Set of members currently online in `community`.
    pub fn presence_set(&self, community: &str) -> String {
        format!("{}:community:{community}{ONLINE_SUFFIX}", self.namespace)
    }

    /// Liveness marker for one (member, community) pair.
    pub fn activity(&self, member: &str, community: &str) -> String {
        format!("{}:activity:{}:{member}:{community}", self.namespace, member.len())
    }

    /// Communities `member` is currently online in.
    pub fn member_index(&self, member: &str) -> String {
        format!("{}:member:{member}:communities", self.namespace)
    }

    pub fn snapshot(&self, community: &str) -> String {
        format!("{}:community:{community}:snapshot", self.namespace)
    }

    /// Peak counter for the calendar window containing `at`.
    pub fn peak(&self, community: &str, window: PeakWindow, at: DateTime<Utc>) -> String {
        format!(
            "{}:community:{community}:peak:{window}:{}",
            self.namespace,
            window.window_id(at)
        )
    }

    /// Glob pattern matching every presence set in the namespace.
    pub fn presence_set_pattern(&self) -> String {
        format!("{}:community:*{ONLINE_SUFFIX}", self.namespace)
    }

    /// Recover the community id from a presence-set key.
    pub fn community_from_presence_set<'a>(&self, key: &'a str) -> Option<&'a str> {
        let rest = key
            .strip_prefix(self.namespace.as_str())?
            .strip_prefix(":community:")?;
        let community = rest.strip_suffix(ONLINE_SUFFIX)?;
        if community.is_empty() {
            None
        } else {
            Some(community)
        }
    }
}

impl Default for KeySpace {
    fn default() -> Self {
        Self::new(crate::types::DEFAULT_NAMESPACE)
    }
}
