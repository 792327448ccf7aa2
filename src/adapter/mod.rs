//! Resource Adapter Module
//!
//! Owns the cache client and the PostgreSQL pool, and exposes the combined
//! health check, shutdown and schema migration.

mod health;
mod migrate;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_postgres::NoTls;
use tracing::{info, warn};

use crate::cache::{AccessStats, CacheClient, CacheStats, RedisCache};
use crate::config::{split_endpoint, Config, MigrationConfig, PostgresConfig};
use crate::error::{AdapterError, Result};
use crate::tasks::CacheWriter;

pub use health::combine as combine_health;
pub use migrate::{
    load_migrations, parse_file_name, Migration, MigrationStatus, Migrator,
};

// == Database Adapter Trait ==
/// Lifecycle contract shared by every adapter, independent of its query handle.
#[async_trait]
pub trait DatabaseAdapter: Send + Sync {
    /// Healthy only when both the cache and the database respond in time.
    async fn ping(&self) -> Result<()>;

    /// Releases the pool and the cache client.
    async fn close(&self) -> Result<()>;

    /// Applies pending schema migrations.
    async fn migrate(&self, config: &MigrationConfig) -> Result<()>;

    /// Accessor counters.
    fn stats(&self) -> CacheStats;
}

// == Adapter ==
/// Cache client, PostgreSQL pool and the caller's query handle `Q`.
///
/// Construct with [`Adapter::new`] (Redis) or [`Adapter::with_cache_client`].
/// Nothing is released implicitly beyond dropping the handles; call
/// [`Adapter::close`] to shut down.
pub struct Adapter<Q, C = RedisCache> {
    pub(crate) cache: Arc<C>,
    pool: Pool,
    pg_config: tokio_postgres::Config,
    pub(crate) connection_timeout: Duration,
    cache_ttl: Duration,
    pub(crate) writer: CacheWriter,
    maintenance: Option<JoinHandle<()>>,
    pub(crate) stats: Arc<AccessStats>,
    queries: Q,
}

impl<Q> Adapter<Q, RedisCache> {
    /// Connects to Redis and PostgreSQL and builds the query handle.
    ///
    /// # Arguments
    /// * `config` - endpoints, credentials, timeout and TTL
    /// * `make_queries` - builds the query handle from the pool
    ///
    /// Fails if the pool cannot be built or the initial health check fails.
    pub async fn new<F>(config: &Config, make_queries: F) -> Result<Self>
    where
        F: FnOnce(Pool) -> Q,
    {
        let cache = RedisCache::new(&config.redis)?;
        Self::with_cache_client(config, cache, make_queries).await
    }
}

impl<Q, C: CacheClient> Adapter<Q, C> {
    /// Like [`Adapter::new`], with a caller-supplied cache client.
    pub async fn with_cache_client<F>(config: &Config, cache: C, make_queries: F) -> Result<Self>
    where
        F: FnOnce(Pool) -> Q,
    {
        info!(
            "Connecting adapter: redis={} db={}, postgres={}",
            config.redis.endpoint,
            config.redis.database,
            config.postgres.connection_url()
        );

        let adapter = Self::assemble(config, cache, make_queries)?;

        if let Err(e) = adapter.ping().await {
            warn!(error = %e, "Initial health check failed");
            adapter.pool.close();
            adapter.stop_background();
            return Err(e);
        }

        info!(
            "Adapter ready: connection_timeout={:?}, cache_ttl={:?}",
            adapter.connection_timeout, adapter.cache_ttl
        );
        Ok(adapter)
    }

    /// Resolves defaults, builds the pool and the query handle and starts the
    /// background tasks, without contacting either backend.
    pub(crate) fn assemble<F>(config: &Config, cache: C, make_queries: F) -> Result<Self>
    where
        F: FnOnce(Pool) -> Q,
    {
        let connection_timeout = config.effective_connection_timeout();
        let cache_ttl = config.effective_cache_ttl();

        let (pool, pg_config) = build_pool(&config.postgres, connection_timeout)?;
        let queries = make_queries(pool.clone());

        let cache = Arc::new(cache);
        let stats = Arc::new(AccessStats::new());
        let writer = CacheWriter::spawn(cache.clone(), &config.writer, cache_ttl, stats.clone());
        let maintenance = if config.cleanup_interval.is_zero() {
            None
        } else {
            cache.clone().spawn_maintenance(config.cleanup_interval)
        };

        Ok(Self {
            cache,
            pool,
            pg_config,
            connection_timeout,
            cache_ttl,
            writer,
            maintenance,
            stats,
            queries,
        })
    }

    fn stop_background(&self) {
        self.writer.shutdown();
        if let Some(handle) = &self.maintenance {
            handle.abort();
        }
    }

    // == Ping ==
    /// Checks the cache and the pool concurrently under one shared deadline.
    ///
    /// Returns the failing resource's error, or [`AdapterError::Unhealthy`]
    /// carrying both messages when neither responds.
    pub async fn ping(&self) -> Result<()> {
        let deadline = Instant::now() + self.connection_timeout;

        let (cache, database) = tokio::join!(
            health::within(deadline, "redis ping", self.cache.ping()),
            health::within(deadline, "postgres ping", health::ping_pool(&self.pool)),
        );

        health::combine(cache, database)
    }

    // == Close ==
    /// Releases the pool, stops the background tasks, then closes the cache
    /// client. Only the cache client's error is reported.
    pub async fn close(&self) -> Result<()> {
        self.pool.close();
        self.stop_background();
        let result = self.cache.close().await;
        info!("Adapter closed");
        result
    }

    // == Migrate ==
    /// Applies pending migrations from `config.migrations_dir`.
    ///
    /// An already up-to-date schema is success.
    pub async fn migrate(&self, config: &MigrationConfig) -> Result<()> {
        let database = self.pg_config.get_dbname().ok_or_else(|| {
            AdapterError::Config("pool configuration has no database name".to_string())
        })?;

        let migrations = load_migrations(&config.migrations_dir).await?;

        let mut conn = self.pool.get().await?;
        let client: &mut tokio_postgres::Client = &mut conn;

        match Migrator::new(client, database).up(&migrations).await? {
            MigrationStatus::Applied(count) => {
                info!(database, "Applied {} migration(s)", count);
            }
            MigrationStatus::NoChange => {
                info!(database, "Schema up to date");
            }
        }

        Ok(())
    }

    // == Accessors ==
    /// The caller's query handle.
    pub fn queries(&self) -> &Q {
        &self.queries
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }
}

#[async_trait]
impl<Q, C> DatabaseAdapter for Adapter<Q, C>
where
    Q: Send + Sync,
    C: CacheClient,
{
    async fn ping(&self) -> Result<()> {
        Adapter::ping(self).await
    }

    async fn close(&self) -> Result<()> {
        Adapter::close(self).await
    }

    async fn migrate(&self, config: &MigrationConfig) -> Result<()> {
        Adapter::migrate(self, config).await
    }

    fn stats(&self) -> CacheStats {
        Adapter::stats(self)
    }
}

// == Pool ==
/// Builds the pool without opening any connection.
fn build_pool(
    config: &PostgresConfig,
    timeout: Duration,
) -> Result<(Pool, tokio_postgres::Config)> {
    let (host, port) = split_endpoint(&config.endpoint)?;

    let mut pg_config = tokio_postgres::Config::new();
    pg_config
        .host(&host)
        .port(port)
        .user(&config.user)
        .password(&config.password)
        .dbname(&config.database)
        .connect_timeout(timeout);

    let manager = Manager::from_config(
        pg_config.clone(),
        NoTls,
        ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        },
    );

    let pool = Pool::builder(manager)
        .max_size(config.max_pool_size.max(1))
        .runtime(Runtime::Tokio1)
        .wait_timeout(Some(timeout))
        .create_timeout(Some(timeout))
        .build()
        .map_err(|e| AdapterError::Database(format!("Failed to create pool: {}", e)))?;

    Ok((pool, pg_config))
}
