//! Redis connection pool management

use deadpool_redis::{Config as DeadpoolConfig, Pool, Runtime};
use std::ops::DerefMut;
use std::time::Duration;

use crate::config::RedisConfig;
use crate::database::backoff_delay;
use crate::error::{sanitize_url, Error, Result};

/// Shared Redis connection pool
pub type RedisPool = Pool;

/// Create a Redis connection pool with retry logic
///
/// The pool is verified with a `PING` before it is returned.
pub async fn create_pool(config: &RedisConfig) -> Result<RedisPool> {
    create_pool_with_retries(config, config.max_retries).await
}

async fn create_pool_with_retries(config: &RedisConfig, max_retries: u32) -> Result<RedisPool> {
    let mut attempt = 0;
    let base_delay = Duration::from_secs(config.retry_delay_secs);

    loop {
        match try_create_pool(config).await {
            Ok(pool) => {
                if attempt > 0 {
                    tracing::info!(
                        "Redis connection established after {} attempt(s)",
                        attempt + 1
                    );
                } else {
                    tracing::info!(
                        "Redis connection pool created: max_connections={}",
                        config.max_connections
                    );
                }
                return Ok(pool);
            }
            Err(e) => {
                attempt += 1;

                if attempt > max_retries {
                    tracing::error!(
                        "Failed to connect to Redis after {} attempts: {}",
                        max_retries + 1,
                        e
                    );
                    return Err(e);
                }

                let delay = backoff_delay(base_delay, attempt);
                tracing::warn!(
                    "Redis connection attempt {} failed: {}. Retrying in {:?}...",
                    attempt,
                    e,
                    delay
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}

/// Attempt to create a Redis pool (single try)
async fn try_create_pool(config: &RedisConfig) -> Result<RedisPool> {
    let url = config.connection_url();
    let cfg = DeadpoolConfig::from_url(url.as_str());

    let pool = cfg
        .builder()
        .map_err(|e| Error::Internal(format!("Failed to build Redis pool: {}", e)))?
        .max_size(config.max_connections)
        .runtime(Runtime::Tokio1)
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create Redis pool: {}", e)))?;

    ping(&pool).await.map_err(|e| {
        Error::Internal(format!(
            "Redis at '{}' did not answer PING: {}",
            sanitize_url(&url),
            e
        ))
    })?;

    Ok(pool)
}

/// Check that the server answers `PING`
pub async fn ping(pool: &RedisPool) -> Result<()> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| Error::Internal(format!("Failed to get Redis connection: {}", e)))?;
    let _: String = redis::cmd("PING").query_async(conn.deref_mut()).await?;
    Ok(())
}
