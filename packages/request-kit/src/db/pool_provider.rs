use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use dashmap::DashMap;
use moka::future::Cache;
use tokio::sync::Mutex;
use tracing::{debug, info};
use xxhash_rust::xxh3::xxh3_64;

use super::connection::{ConnectionPool, DbError};
use super::sea::{SeaOrmConnection, SeaOrmPool};
use crate::config::env::Environment;
use crate::error::WebError;

/// Pool used when no name is given.
pub const DEFAULT_POOL_NAME: &str = "db_pool";

const POOL_KEY_PREFIX: &str = "jdbc/";

/// Environment key naming the connection URL of pool `name`.
pub fn pool_key(name: Option<&str>) -> String {
    format!("{POOL_KEY_PREFIX}{}", name.unwrap_or(DEFAULT_POOL_NAME))
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PoolKey {
    url_hash: u64,
}

impl PoolKey {
    fn new(url: &str) -> Self {
        Self {
            url_hash: xxh3_64(url.as_bytes()),
        }
    }
}

fn build_cache() -> Cache<PoolKey, SeaOrmPool> {
    Cache::builder()
        .max_capacity(16)
        .eviction_listener(|_k, pool: SeaOrmPool, _cause| {
            // The cache's clone is one of the refs; the pool closes once the last one drops.
            debug!(
                shared_pool = "evicted",
                remaining_refs = pool.shared_count() - 1,
                "Dropping cached database pool"
            );
        })
        .build()
}

/// Resolves pool names to shared pools through an [`Environment`].
///
/// `jdbc/<name>` holds the connection URL. Pools are built once per URL and
/// reused by every later lookup.
///
/// As a [`ConnectionPool`], the provider resolves its configured pool on
/// every acquisition, so the request guard can be handed the provider
/// directly.
pub struct PoolProvider<E> {
    env: E,
    pool_name: Option<String>,
    cache: Cache<PoolKey, SeaOrmPool>,
    init_locks: DashMap<PoolKey, Arc<Mutex<()>>>,
}

impl<E: Environment> PoolProvider<E> {
    pub fn new(env: E) -> Self {
        Self {
            env,
            pool_name: None,
            cache: build_cache(),
            init_locks: DashMap::new(),
        }
    }

    /// Use pool `name` instead of [`DEFAULT_POOL_NAME`] when acting as a
    /// [`ConnectionPool`].
    pub fn with_pool_name(mut self, name: impl Into<String>) -> Self {
        self.pool_name = Some(name.into());
        self
    }

    pub fn environment(&self) -> &E {
        &self.env
    }

    pub async fn default_data_source(&self) -> Result<SeaOrmPool, WebError> {
        self.data_source(None).await
    }

    /// Shared pool for `pool_name` (default [`DEFAULT_POOL_NAME`]).
    pub async fn data_source(&self, pool_name: Option<&str>) -> Result<SeaOrmPool, WebError> {
        let name = pool_key(pool_name);
        let url = self.env.variable(&name)?;
        let key = PoolKey::new(&url);

        // Fast path: outside the mutex
        if let Some(pool) = self.cache.get(&key).await {
            debug!(shared_pool = "reuse", pool = %name, "Reusing database pool");
            return Ok(pool);
        }

        let lock = self
            .init_locks
            .entry(key.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();

        let wait_start = Instant::now();
        let _guard = lock.lock().await;
        let wait_ms = wait_start.elapsed().as_millis();
        if wait_ms > 0 {
            debug!(
                shared_pool = "dedup_wait_ms",
                pool = %name,
                wait_ms = wait_ms,
                "Waited for concurrent pool creation"
            );
        }

        // Second check: inside the mutex
        if let Some(pool) = self.cache.get(&key).await {
            return Ok(pool);
        }

        info!(pool = %name, "Building database pool");
        let pool = match SeaOrmPool::connect(&url).await {
            Ok(pool) => pool,
            Err(e) => {
                self.init_locks.remove(&key);
                return Err(WebError::connection_acquisition(format!(
                    "pool '{name}': {e}"
                )));
            }
        };
        self.cache.insert(key.clone(), pool.clone()).await;
        self.init_locks.remove(&key);

        Ok(pool)
    }
}

#[async_trait]
impl<E> ConnectionPool for PoolProvider<E>
where
    E: Environment + 'static,
{
    type Conn = SeaOrmConnection;

    async fn acquire(&self) -> Result<SeaOrmConnection, DbError> {
        let pool = self
            .data_source(self.pool_name.as_deref())
            .await
            .map_err(|e| match e {
                WebError::Configuration { name } => DbError::Configuration { name },
                other => DbError::Unavailable(other.to_string()),
            })?;
        pool.acquire().await
    }
}
