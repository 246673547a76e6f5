//! Redis-backed presence store.
//!
//! Uses a multiplexed `ConnectionManager` (cloned per call, reconnects on
//! failure). Every command is bounded by the configured operation timeout.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use pulse_core::{PresenceStore, ScanPage, StoreError, StoreResult, StoreSettings};
use pulse_logging::redact_credentials;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, Client, ErrorKind, RedisError, RedisResult, Script};
use tracing::{debug, info};

/// Raise KEYS[1] to ARGV[1] if larger, with expiry ARGV[2] seconds on write.
const RAISE_TO_SCRIPT: &str = r#"
local current = tonumber(redis.call('GET', KEYS[1]) or '0') or 0
local candidate = tonumber(ARGV[1])
if candidate > current then
    redis.call('SET', KEYS[1], ARGV[1], 'EX', ARGV[2])
    return candidate
end
return current
"#;

pub struct RedisStore {
    conn: ConnectionManager,
    op_timeout: Duration,
    raise_script: Script,
}

impl RedisStore {
    /// Connect using `settings.url`, giving up after `settings.connect_timeout`.
    pub async fn connect(settings: &StoreSettings) -> StoreResult<Self> {
        let client = Client::open(settings.url.as_str()).map_err(map_redis_error)?;
        let config = ConnectionManagerConfig::new().set_number_of_retries(settings.retries);

        let conn = tokio::time::timeout(
            settings.connect_timeout,
            client.get_connection_manager_with_config(config),
        )
        .await
        .map_err(|_| StoreError::Timeout { op: "connect", timeout: settings.connect_timeout })?
        .map_err(map_redis_error)?;

        info!(url = %redact_credentials(&settings.url), "Connected to redis");
        Ok(Self {
            conn,
            op_timeout: settings.operation_timeout,
            raise_script: Script::new(RAISE_TO_SCRIPT),
        })
    }

    /// Await a redis future under the operation timeout.
    async fn run<T, F>(&self, op: &'static str, fut: F) -> StoreResult<T>
    where
        F: Future<Output = RedisResult<T>>,
    {
        match tokio::time::timeout(self.op_timeout, fut).await {
            Ok(result) => result.map_err(|e| {
                debug!(op, error = %e, "Redis command failed");
                map_redis_error(e)
            }),
            Err(_) => Err(StoreError::Timeout { op, timeout: self.op_timeout }),
        }
    }
}

/// Whole seconds for an expiry; Redis rejects zero.
fn expiry_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

fn map_redis_error(err: RedisError) -> StoreError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
    {
        return StoreError::Unavailable(err.to_string());
    }
    if err.code() == Some("WRONGTYPE") {
        return StoreError::WrongType(err.detail().unwrap_or_default().to_string());
    }
    match err.kind() {
        ErrorKind::TypeError => StoreError::Decode {
            key: String::new(),
            message: err.to_string(),
        },
        _ => StoreError::Backend(err.to_string()),
    }
}

#[async_trait]
impl PresenceStore for RedisStore {
    fn name(&self) -> &str {
        "redis"
    }

    async fn add_to_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = self.run("sadd", conn.sadd(key, member)).await?;
        Ok(added > 0)
    }

    async fn remove_from_set(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = self.run("srem", conn.srem(key, member)).await?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        let mut conn = self.conn.clone();
        self.run("smembers", conn.smembers(key)).await
    }

    async fn set_cardinality(&self, key: &str) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        self.run("scard", conn.scard(key)).await
    }

    async fn is_set_member(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        self.run("sismember", conn.sismember(key, member)).await
    }

    async fn set_with_expiry(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        self.run("setex", conn.set_ex(key, value, expiry_secs(ttl))).await
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        self.run("get", conn.get(key)).await
    }

    async fn exists_many(&self, keys: &[String]) -> StoreResult<Vec<bool>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut pipe = redis::pipe();
        for key in keys {
            pipe.exists(key);
        }
        let mut conn = self.conn.clone();
        self.run("exists", pipe.query_async(&mut conn)).await
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        self.run("expire", conn.expire(key, expiry_secs(ttl) as i64)).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let deleted: i64 = self.run("del", conn.del(key)).await?;
        Ok(deleted > 0)
    }

    async fn raise_to(&self, key: &str, value: u64, ttl: Duration) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        let mut invocation = self.raise_script.key(key);
        invocation.arg(value).arg(expiry_secs(ttl));
        self.run("raise_to", invocation.invoke_async(&mut conn)).await
    }

    async fn scan_page(&self, pattern: &str, cursor: u64, count: usize) -> StoreResult<ScanPage> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SCAN");
        cmd.arg(cursor).arg("MATCH").arg(pattern).arg("COUNT").arg(count.max(1));
        let (cursor, keys): (u64, Vec<String>) = self.run("scan", cmd.query_async(&mut conn)).await?;
        Ok(ScanPage { cursor, keys })
    }

    async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let _: String = self.run("ping", redis::cmd("PING").query_async(&mut conn)).await?;
        Ok(())
    }
}
