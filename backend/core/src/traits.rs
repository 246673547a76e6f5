use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::StoreResult;

/// One page of a cursor-based key scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` once the scan is complete.
    pub cursor: u64,
    pub keys: Vec<String>,
}

/// Typed adapter over an expiring key-value store.
///
/// Implementations own all encoding/decoding; callers only see domain values.
/// Every method must be safe to call concurrently from many tasks.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Backend name for logs (e.g. "redis", "memory").
    fn name(&self) -> &str;

    /// Add `member` to the set at `key`. Returns true if it was newly added.
    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Remove `member` from the set at `key`. Returns true if it was present.
    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<bool>;

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>>;

    /// Cardinality of the set at `key`; 0 if the key does not exist.
    async fn set_cardinality(&self, key: &str) -> StoreResult<u64>;

    async fn is_set_member(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Store a string value that expires after `ttl`.
    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Existence check for many keys in one round trip, in input order.
    async fn exists_many(&self, keys: &[String]) -> StoreResult<Vec<bool>>;

    /// Reset the expiry of `key`. Returns false if the key does not exist.
    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Returns true if the key existed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Atomically raise the integer at `key` to `value` if `value` is larger,
    /// setting `ttl` on write. Returns the value held afterwards.
    async fn raise_to(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<u64>;

    /// Glob-match keys (`*`, `?`) one page at a time. Start with cursor 0.
    async fn scan_page(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage>;

    async fn ping(&self) -> StoreResult<()>;

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let found = self.exists_many(&[key.to_string()]).await?;
        Ok(found.first().copied().unwrap_or(false))
    }
}
