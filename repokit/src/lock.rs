//! Distributed lock on Redis
//!
//! A lock is a Redis key set with `SET key token NX PX ttl`. Only the holder
//! of the random token can release or extend it; both go through Lua scripts
//! that compare the token first, so an expired lock re-acquired by someone
//! else is never touched.
//!
//! # Example
//!
//! ```rust,ignore
//! let locker = ds.locker().expect("redis configured");
//! let guard = locker.acquire("order:42").await?;
//! // ... critical section ...
//! guard.release().await?;
//! ```

use std::fmt;
use std::ops::DerefMut;
use std::time::Duration;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::RedisPool;
use crate::config::LockConfig;
use crate::error::{Error, Result};

const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const EXTEND_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Creates named locks on a Redis pool
#[derive(Clone)]
pub struct LockManager {
    pool: RedisPool,
    config: LockConfig,
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn get_connection(pool: &RedisPool) -> Result<deadpool_redis::Connection> {
    pool.get().await.map_err(|e| {
        let redis_err = redis::RedisError::from((
            redis::ErrorKind::IoError,
            "Failed to get Redis connection for lock",
            e.to_string(),
        ));
        Error::Redis(Box::new(redis_err))
    })
}

impl LockManager {
    /// Create a lock manager
    pub fn new(pool: RedisPool, config: LockConfig) -> Self {
        Self { pool, config }
    }

    /// Lock settings
    pub fn config(&self) -> &LockConfig {
        &self.config
    }

    /// Redis key backing the lock `name`
    pub fn key(&self, name: &str) -> String {
        format!("{}{}", self.config.key_prefix, name)
    }

    /// Acquire `name` with the configured TTL, retrying while it is held
    pub async fn acquire(&self, name: &str) -> Result<LockGuard> {
        self.acquire_with_ttl(name, self.config.ttl()).await
    }

    /// Acquire `name` with an explicit TTL, retrying while it is held
    ///
    /// Makes up to `retry_count` attempts `retry_delay_ms` apart and fails
    /// with [`Error::Lock`] if the lock never frees up.
    pub async fn acquire_with_ttl(&self, name: &str, ttl: Duration) -> Result<LockGuard> {
        let attempts = self.config.retry_count.max(1);
        for attempt in 1..=attempts {
            if let Some(guard) = self.try_acquire_with_ttl(name, ttl).await? {
                return Ok(guard);
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.retry_delay()).await;
            }
        }
        warn!(lock = name, attempts, "lock not acquired");
        Err(Error::Lock(format!(
            "lock '{}' still held after {} attempts",
            name, attempts
        )))
    }

    /// Single attempt with the configured TTL; `None` when the lock is held
    pub async fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>> {
        self.try_acquire_with_ttl(name, self.config.ttl()).await
    }

    /// Single attempt with an explicit TTL; `None` when the lock is held
    pub async fn try_acquire_with_ttl(
        &self,
        name: &str,
        ttl: Duration,
    ) -> Result<Option<LockGuard>> {
        let key = self.key(name);
        let token = Uuid::new_v4().to_string();
        let ttl_ms = ttl_millis(ttl)?;

        let mut conn = get_connection(&self.pool).await?;
        let reply: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&token)
            .arg("NX")
            .arg("PX")
            .arg(ttl_ms)
            .query_async(conn.deref_mut())
            .await?;

        if reply.is_none() {
            return Ok(None);
        }
        debug!(lock = %key, ttl_ms, "lock acquired");
        Ok(Some(LockGuard {
            pool: self.pool.clone(),
            key,
            token,
        }))
    }
}

fn ttl_millis(ttl: Duration) -> Result<u64> {
    let ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
    if ms == 0 {
        return Err(Error::Lock("lock ttl must be at least 1ms".to_string()));
    }
    Ok(ms)
}

/// A held lock
///
/// Dropping the guard does not release the lock; it expires after its TTL.
/// Call [`LockGuard::release`] to free it early.
pub struct LockGuard {
    pool: RedisPool,
    key: String,
    token: String,
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl LockGuard {
    /// Redis key of the lock
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Ownership token stored under the key
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Release the lock
    ///
    /// Returns `false` when the lock had already expired or changed hands.
    pub async fn release(self) -> Result<bool> {
        let mut conn = get_connection(&self.pool).await?;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .invoke_async(conn.deref_mut())
            .await?;
        debug!(lock = %self.key, released = deleted == 1, "lock released");
        Ok(deleted == 1)
    }

    /// Reset the lock's expiry to `ttl` from now
    ///
    /// Returns `false` when the lock is no longer held by this guard.
    pub async fn extend(&self, ttl: Duration) -> Result<bool> {
        let ttl_ms = ttl_millis(ttl)?;
        let mut conn = get_connection(&self.pool).await?;
        let extended: i64 = redis::Script::new(EXTEND_SCRIPT)
            .key(&self.key)
            .arg(&self.token)
            .arg(ttl_ms)
            .invoke_async(conn.deref_mut())
            .await?;
        debug!(lock = %self.key, ttl_ms, extended = extended == 1, "lock extended");
        Ok(extended == 1)
    }
}
