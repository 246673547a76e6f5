//! In-process presence store.
//!
//! Emulates the subset of Redis semantics the tracker relies on: sets that
//! vanish when emptied, per-key expiry, glob key scans. Expiry is lazy and
//! measured on `tokio::time::Instant`, so paused-clock tests can drive it.
//!
//! Scan cursors remember the last key handed out and resume after it in key
//! order, so a key that lives for the whole scan is returned even when other
//! keys are deleted between pages.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{PresenceStore, ScanPage, StoreError, StoreResult};
use tokio::sync::Mutex;
use tokio::time::Instant;

enum Value {
    Text(String),
    Set(HashSet<String>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Default)]
struct ScanCursors {
    last_issued: u64,
    resume_after: HashMap<u64, String>,
}

impl ScanCursors {
    fn issue(&mut self, last_key: String) -> u64 {
        self.last_issued = self.last_issued.wrapping_add(1).max(1);
        self.resume_after.insert(self.last_issued, last_key);
        self.last_issued
    }
}

/// Store backed by a shared in-memory map. Clones share state.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    cursors: Arc<Mutex<ScanCursors>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining lifetime of `key`; `None` if missing or without expiry.
    pub async fn ttl(&self, key: &str) -> Option<Duration> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        live(&mut entries, key, now)?
            .expires_at
            .map(|at| at.saturating_duration_since(now))
    }
}

/// Look up `key`, evicting it first if it has expired.
fn live<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
    now: Instant,
) -> Option<&'a mut Entry> {
    if entries.get(key).is_some_and(|e| !e.is_live(now)) {
        entries.remove(key);
    }
    entries.get_mut(key)
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

#[async_trait]
impl PresenceStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.insert(member.to_string())),
            Some(_) => Err(wrong_type(key)),
            None => {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value: Value::Set(HashSet::from([member.to_string()])),
                        expires_at: None,
                    },
                );
                Ok(true)
            }
        }
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let (removed, now_empty) = match live(&mut entries, key, Instant::now()) {
            Some(Entry { value: Value::Set(set), .. }) => (set.remove(member), set.is_empty()),
            Some(_) => return Err(wrong_type(key)),
            None => return Ok(false),
        };
        // Redis drops a set together with its last member.
        if now_empty {
            entries.remove(key);
        }
        Ok(removed)
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.clone()),
            Some(_) => Err(wrong_type(key)),
            None => Ok(HashSet::new()),
        }
    }

    async fn set_cardinality(&self, key: &str) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.len() as u64),
            Some(_) => Err(wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn is_set_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            Some(Entry { value: Value::Set(set), .. }) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key)),
            None => Ok(false),
        }
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock().await;
        match live(&mut entries, key, Instant::now()) {
            Some(Entry { value: Value::Text(text), .. }) => Ok(Some(text.clone())),
            Some(_) => Err(wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn exists_many(&self, keys: &[String]) -> StoreResult<Vec<bool>> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        Ok(keys
            .iter()
            .map(|key| live(&mut entries, key, now).is_some())
            .collect())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        match live(&mut entries, key, now) {
            Some(entry) => {
                entry.expires_at = Some(now + ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut entries = self.entries.lock().await;
        let existed = live(&mut entries, key, Instant::now()).is_some();
        entries.remove(key);
        Ok(existed)
    }

    async fn raise_to(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<u64> {
        let mut entries = self.entries.lock().await;
        let now = Instant::now();
        // Unparseable counters count as zero and get overwritten, like the Lua script.
        let current = match live(&mut entries, key, now) {
            Some(Entry { value: Value::Text(text), .. }) => text.parse::<u64>().unwrap_or(0),
            Some(_) => return Err(wrong_type(key)),
            None => 0,
        };
        if value <= current {
            return Ok(current);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value.to_string()),
                expires_at: Some(now + ttl),
            },
        );
        Ok(value)
    }

    async fn scan_page(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let mut entries = self.entries.lock().await;
        let mut cursors = self.cursors.lock().await;
        let now = Instant::now();
        entries.retain(|_, e| e.is_live(now));

        let after = match cursor {
            0 => None,
            id => Some(cursors.resume_after.remove(&id).ok_or_else(|| {
                StoreError::Backend(format!("unknown scan cursor {id}"))
            })?),
        };

        let mut matching: Vec<&String> = entries
            .keys()
            .filter(|key| after.as_deref().map_or(true, |last| key.as_str() > last))
            .filter(|key| glob_match(pattern, key))
            .collect();
        matching.sort();

        let page: Vec<String> = matching
            .iter()
            .take(count.max(1))
            .map(|key| (*key).clone())
            .collect();
        let cursor = match page.last() {
            Some(last) if matching.len() > page.len() => cursors.issue(last.clone()),
            _ => 0,
        };
        Ok(ScanPage { cursor, keys: page })
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Redis-style glob match supporting `*` and `?`.
pub(crate) fn glob_match(pattern: &str, text: &str) -> bool {
    let (p, t) = (pattern.as_bytes(), text.as_bytes());
    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == b'?' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == b'*' {
            star = Some((pi, ti));
            pi += 1;
        } else if let Some((sp, st)) = star {
            pi = sp + 1;
            ti = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == b'*' {
        pi += 1;
    }
    pi == p.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("presence:community:*:online", "presence:community:c1:online"));
        assert!(glob_match("presence:community:*:online", "presence:community:a:b:online"));
        assert!(!glob_match("presence:community:*:online", "presence:community:c1:snapshot"));
        assert!(glob_match("k?y", "key"));
        assert!(!glob_match("k?y", "kaay"));
        assert!(glob_match("*", ""));
    }

    #[tokio::test]
    async fn test_set_lifecycle() {
        let store = MemoryStore::new();
        assert!(store.add_to_set("s", "a").await.unwrap());
        assert!(!store.add_to_set("s", "a").await.unwrap());
        store.add_to_set("s", "b").await.unwrap();
        assert_eq!(store.set_cardinality("s").await.unwrap(), 2);
        assert!(store.is_set_member("s", "b").await.unwrap());

        assert!(store.remove_from_set("s", "a").await.unwrap());
        assert!(!store.remove_from_set("s", "a").await.unwrap());
        assert!(store.remove_from_set("s", "b").await.unwrap());
        // Emptied sets disappear.
        assert!(!store.exists("s").await.unwrap());
    }

    #[tokio::test]
    async fn test_wrong_type_is_reported() {
        let store = MemoryStore::new();
        store.set_with_expiry("k", "v", Duration::from_secs(5)).await.unwrap();
        let err = store.add_to_set("k", "m").await.unwrap_err();
        assert!(matches!(err, StoreError::WrongType(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let store = MemoryStore::new();
        store.set_with_expiry("k", "v", Duration::from_secs(10)).await.unwrap();
        store.add_to_set("s", "m").await.unwrap();
        assert!(store.expire("s", Duration::from_secs(20)).await.unwrap());

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.set_cardinality("s").await.unwrap(), 1);
        assert_eq!(store.ttl("s").await, Some(Duration::from_secs(9)));

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(store.set_cardinality("s").await.unwrap(), 0);
        assert!(!store.expire("s", Duration::from_secs(20)).await.unwrap());
    }

    #[tokio::test]
    async fn test_raise_to_only_grows() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.raise_to("peak", 3, ttl).await.unwrap(), 3);
        assert_eq!(store.raise_to("peak", 2, ttl).await.unwrap(), 3);
        assert_eq!(store.raise_to("peak", 3, ttl).await.unwrap(), 3);
        assert_eq!(store.raise_to("peak", 5, ttl).await.unwrap(), 5);
        assert_eq!(store.get("peak").await.unwrap().as_deref(), Some("5"));
    }

    #[tokio::test]
    async fn test_raise_to_overwrites_garbage() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        store.set_with_expiry("peak", "not-a-number", ttl).await.unwrap();
        assert_eq!(store.raise_to("peak", 4, ttl).await.unwrap(), 4);
        assert_eq!(store.get("peak").await.unwrap().as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_scan_survives_deletes_between_pages() {
        let store = MemoryStore::new();
        for i in 0..4 {
            store.add_to_set(&format!("ns:community:c{i}:online"), "m").await.unwrap();
        }

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = store.scan_page("ns:community:*:online", cursor, 1).await.unwrap();
            for key in &page.keys {
                store.remove_from_set(key, "m").await.unwrap();
            }
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(
            seen,
            (0..4).map(|i| format!("ns:community:c{i}:online")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn test_unknown_scan_cursor_is_an_error() {
        let store = MemoryStore::new();
        assert!(store.scan_page("*", 42, 10).await.is_err());
    }

    #[tokio::test]
    async fn test_scan_pages_through_matches() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.add_to_set(&format!("ns:community:c{i}:online"), "m").await.unwrap();
        }
        store.set_with_expiry("ns:community:c0:snapshot", "{}", Duration::from_secs(30)).await.unwrap();

        let mut cursor = 0;
        let mut seen = Vec::new();
        loop {
            let page = store.scan_page("ns:community:*:online", cursor, 2).await.unwrap();
            assert!(page.keys.len() <= 2);
            seen.extend(page.keys);
            cursor = page.cursor;
            if cursor == 0 {
                break;
            }
        }
        assert_eq!(seen.len(), 5);
        assert!(seen.iter().all(|k| k.ends_with(":online")));
    }
}
