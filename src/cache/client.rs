//! Cache Client Module
//!
//! Capability trait over the key-value cache and its Redis implementation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::{AsyncCommands, ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::config::{split_endpoint, RedisConfig};
use crate::error::{AdapterError, Result};

// == Cache Client Trait ==
/// Key-value cache used by the adapter.
///
/// Implementations must be safe for concurrent use; the adapter shares a
/// single instance between every accessor call and the background writer.
#[async_trait]
pub trait CacheClient: Send + Sync + 'static {
    /// Returns the payload stored under `key`, or [`AdapterError::CacheMiss`].
    async fn get(&self, key: &str) -> Result<String>;

    /// Stores `payload` under `key`, expiring after `ttl`.
    async fn set(&self, key: &str, payload: String, ttl: Duration) -> Result<()>;

    /// Liveness check.
    async fn ping(&self) -> Result<()>;

    /// Releases the client. Calls made afterwards fail.
    async fn close(&self) -> Result<()>;

    /// Starts housekeeping the client needs to run alongside the adapter,
    /// repeating every `interval`. Clients whose server expires entries
    /// itself have nothing to run.
    fn spawn_maintenance(self: Arc<Self>, _interval: Duration) -> Option<JoinHandle<()>> {
        None
    }
}

// == Redis Cache ==
/// Redis-backed cache client.
///
/// Construction performs no network round trip; the connection is opened on
/// first use and retried on the next call if opening fails. Once open, a
/// dropped connection is replaced in the background and the calls after the
/// failing one go to the new connection.
pub struct RedisCache {
    client: redis::Client,
    connection: OnceCell<ConnectionManager>,
    closed: AtomicBool,
}

impl RedisCache {
    pub fn new(config: &RedisConfig) -> Result<Self> {
        let (host, port) = split_endpoint(&config.endpoint)?;
        let info = ConnectionInfo {
            addr: ConnectionAddr::Tcp(host, port),
            redis: RedisConnectionInfo {
                db: config.database,
                password: config.password.clone(),
                ..Default::default()
            },
        };

        let client = redis::Client::open(info)?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
            closed: AtomicBool::new(false),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager> {
        if self.closed.load(Ordering::Acquire) {
            return Err(AdapterError::CacheClosed);
        }

        let conn = self
            .connection
            .get_or_try_init(|| async {
                debug!("Opening redis connection");
                // One attempt per call; the caller's next call tries again
                let config = ConnectionManagerConfig::new().set_number_of_retries(0);
                ConnectionManager::new_with_config(self.client.clone(), config).await
            })
            .await?;

        Ok(conn.clone())
    }
}

#[async_trait]
impl CacheClient for RedisCache {
    async fn get(&self, key: &str) -> Result<String> {
        let mut conn = self.connection().await?;
        let payload: Option<String> = conn.get(key).await?;
        payload.ok_or_else(|| AdapterError::CacheMiss(key.to_string()))
    }

    async fn set(&self, key: &str, payload: String, ttl: Duration) -> Result<()> {
        let mut conn = self.connection().await?;
        // Redis rejects a zero expiry.
        let seconds = ttl.as_secs().max(1);
        let _: () = conn.set_ex(key, payload, seconds).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(AdapterError::CacheClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn unreachable_config() -> RedisConfig {
        RedisConfig {
            endpoint: "127.0.0.1:1".to_string(),
            password: None,
            database: 0,
        }
    }

    #[test]
    fn test_new_does_not_connect() {
        assert!(RedisCache::new(&unreachable_config()).is_ok());
    }

    #[test]
    fn test_new_rejects_bad_endpoint() {
        let config = RedisConfig {
            endpoint: "no-port".to_string(),
            ..RedisConfig::default()
        };
        assert!(matches!(RedisCache::new(&config), Err(AdapterError::Config(_))));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_cache_error() {
        let cache = RedisCache::new(&unreachable_config()).unwrap();

        assert!(matches!(cache.ping().await, Err(AdapterError::Cache(_))));
        assert!(matches!(cache.get("author:1").await, Err(AdapterError::Cache(_))));
    }

    /// Minimal RESP server answering `+PONG` to every command. The first
    /// connection is closed right after it serves a PING.
    async fn flaky_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            let mut first = true;
            while let Ok((mut socket, _)) = listener.accept().await {
                let drop_after_ping = std::mem::replace(&mut first, false);
                tokio::spawn(async move {
                    let mut buf = [0u8; 1024];
                    while let Ok(n) = socket.read(&mut buf).await {
                        if n == 0 {
                            break;
                        }
                        let chunk = &buf[..n];
                        let commands = chunk
                            .split(|b| *b == b'\n')
                            .filter(|line| line.first() == Some(&b'*'))
                            .count();
                        let reply = "+PONG\r\n".repeat(commands);
                        if socket.write_all(reply.as_bytes()).await.is_err() {
                            break;
                        }
                        let was_ping = chunk.windows(4).any(|w| w == b"PING");
                        if drop_after_ping && was_ping {
                            break;
                        }
                    }
                });
            }
        });

        addr
    }

    #[tokio::test]
    async fn test_recovers_after_server_drops_connection() {
        let endpoint = flaky_server().await;
        let cache = RedisCache::new(&RedisConfig {
            endpoint,
            ..RedisConfig::default()
        })
        .unwrap();

        cache.ping().await.unwrap();

        let mut outcomes = Vec::new();
        for _ in 0..10 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            outcomes.push(cache.ping().await.is_ok());
        }

        assert!(
            outcomes.iter().skip(3).all(|ok| *ok),
            "pings after the drop should succeed again: {:?}",
            outcomes
        );
    }

    #[tokio::test]
    async fn test_redis_has_no_maintenance_task() {
        let cache = Arc::new(RedisCache::new(&unreachable_config()).unwrap());
        assert!(cache.spawn_maintenance(Duration::from_millis(10)).is_none());
    }

    #[tokio::test]
    async fn test_close_twice_fails() {
        let cache = RedisCache::new(&unreachable_config()).unwrap();

        assert!(cache.close().await.is_ok());
        assert!(matches!(cache.close().await, Err(AdapterError::CacheClosed)));
        assert!(matches!(cache.get("k").await, Err(AdapterError::CacheClosed)));
    }
}
