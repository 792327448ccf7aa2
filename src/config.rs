//! Configuration Module
//!
//! Handles loading and managing adapter configuration from environment variables.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{AdapterError, Result};

// == Defaults ==
/// Default bound for connection establishment and health checks.
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// Default lifetime of a cache entry (90 days).
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(90 * 24 * 60 * 60);

/// Default interval between sweeps of an in-process cache.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// Redis endpoint and credentials.
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// `host:port`
    pub endpoint: String,
    pub password: Option<String>,
    /// Logical database index
    pub database: i64,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:6379".to_string(),
            password: None,
            database: 0,
        }
    }
}

/// PostgreSQL endpoint and credentials.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// `host:port`
    pub endpoint: String,
    pub user: String,
    pub password: String,
    pub database: String,
    /// Maximum number of pooled connections
    pub max_pool_size: usize,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            endpoint: "localhost:5432".to_string(),
            user: "postgres".to_string(),
            password: String::new(),
            database: "postgres".to_string(),
            max_pool_size: 16,
        }
    }
}

impl PostgresConfig {
    /// Connection URL with the password redacted, for logging.
    pub fn connection_url(&self) -> String {
        format!(
            "postgresql://{}:***@{}/{}",
            self.user, self.endpoint, self.database
        )
    }
}

/// Bounds for the background cache repopulation writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Pending writes held before new ones are dropped
    pub queue_capacity: usize,
    /// Writes allowed to run against the cache at once
    pub max_in_flight: usize,
    /// Deadline applied to each individual write
    pub write_timeout: Duration,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_in_flight: 32,
            write_timeout: Duration::from_secs(2),
        }
    }
}

/// Location of the ordered `.up.sql` migration scripts.
#[derive(Debug, Clone)]
pub struct MigrationConfig {
    pub migrations_dir: PathBuf,
}

impl MigrationConfig {
    pub fn new(migrations_dir: impl Into<PathBuf>) -> Self {
        Self {
            migrations_dir: migrations_dir.into(),
        }
    }
}

/// Adapter configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub redis: RedisConfig,
    pub postgres: PostgresConfig,
    /// Shared deadline for the combined health check and cache reads.
    /// Zero selects [`DEFAULT_CONNECTION_TIMEOUT`].
    pub connection_timeout: Duration,
    /// Expiry of repopulated cache entries. Zero selects [`DEFAULT_CACHE_TTL`].
    pub cache_ttl: Duration,
    pub writer: WriterConfig,
    /// Interval between expired-entry sweeps for caches that need them.
    /// Zero disables the sweep.
    pub cleanup_interval: Duration,
    /// HTTP server port
    pub server_port: u16,
    /// Migrations applied at startup, if set
    pub migrations_dir: Option<PathBuf>,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `REDIS_ENDPOINT`, `REDIS_PASSWORD`, `REDIS_DB`
    /// - `POSTGRES_ENDPOINT`, `POSTGRES_USER`, `POSTGRES_PASSWORD`, `POSTGRES_DB`,
    ///   `POSTGRES_POOL_SIZE`
    /// - `CONNECTION_TIMEOUT` - seconds (default: 30)
    /// - `CACHE_TTL` - seconds (default: 90 days)
    /// - `CACHE_WRITE_QUEUE`, `CACHE_WRITE_CONCURRENCY`, `CACHE_WRITE_TIMEOUT_MS`
    /// - `CLEANUP_INTERVAL` - in-process cache sweep, seconds (default: 1)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `MIGRATIONS_DIR` - applied on startup when present
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds the configuration from `lookup`, which maps a variable name to
    /// its value. Missing or unparsable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let parse = |name: &str| lookup(name).and_then(|v| v.parse::<u64>().ok());

        Self {
            redis: RedisConfig {
                endpoint: lookup("REDIS_ENDPOINT").unwrap_or(defaults.redis.endpoint),
                password: lookup("REDIS_PASSWORD").filter(|p| !p.is_empty()),
                database: lookup("REDIS_DB")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.redis.database),
            },
            postgres: PostgresConfig {
                endpoint: lookup("POSTGRES_ENDPOINT").unwrap_or(defaults.postgres.endpoint),
                user: lookup("POSTGRES_USER").unwrap_or(defaults.postgres.user),
                password: lookup("POSTGRES_PASSWORD").unwrap_or_default(),
                database: lookup("POSTGRES_DB").unwrap_or(defaults.postgres.database),
                max_pool_size: lookup("POSTGRES_POOL_SIZE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.postgres.max_pool_size),
            },
            connection_timeout: parse("CONNECTION_TIMEOUT")
                .map(Duration::from_secs)
                .unwrap_or(defaults.connection_timeout),
            cache_ttl: parse("CACHE_TTL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cache_ttl),
            writer: WriterConfig {
                queue_capacity: lookup("CACHE_WRITE_QUEUE")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.writer.queue_capacity),
                max_in_flight: lookup("CACHE_WRITE_CONCURRENCY")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.writer.max_in_flight),
                write_timeout: parse("CACHE_WRITE_TIMEOUT_MS")
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.writer.write_timeout),
            },
            cleanup_interval: parse("CLEANUP_INTERVAL")
                .map(Duration::from_secs)
                .unwrap_or(defaults.cleanup_interval),
            server_port: lookup("SERVER_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.server_port),
            migrations_dir: lookup("MIGRATIONS_DIR")
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
        }
    }

    /// Connection timeout with zero mapped to the default.
    pub fn effective_connection_timeout(&self) -> Duration {
        if self.connection_timeout.is_zero() {
            DEFAULT_CONNECTION_TIMEOUT
        } else {
            self.connection_timeout
        }
    }

    /// Cache TTL with zero mapped to the default.
    pub fn effective_cache_ttl(&self) -> Duration {
        if self.cache_ttl.is_zero() {
            DEFAULT_CACHE_TTL
        } else {
            self.cache_ttl
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redis: RedisConfig::default(),
            postgres: PostgresConfig::default(),
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            cache_ttl: DEFAULT_CACHE_TTL,
            writer: WriterConfig::default(),
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            server_port: 3000,
            migrations_dir: None,
        }
    }
}

// == Endpoint Parsing ==
/// Splits a `host:port` endpoint.
pub fn split_endpoint(endpoint: &str) -> Result<(String, u16)> {
    let (host, port) = endpoint
        .rsplit_once(':')
        .ok_or_else(|| AdapterError::Config(format!("endpoint '{}' is missing a port", endpoint)))?;

    if host.is_empty() {
        return Err(AdapterError::Config(format!(
            "endpoint '{}' is missing a host",
            endpoint
        )));
    }

    let port = port
        .parse::<u16>()
        .map_err(|_| AdapterError::Config(format!("endpoint '{}' has an invalid port", endpoint)))?;

    Ok((host.trim_matches(|c| c == '[' || c == ']').to_string(), port))
}
