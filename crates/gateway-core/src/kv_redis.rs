//! A Redis-backed [`KvStore`], the distributed adapter used in production.

use crate::error::GatewayError;
use crate::kv::KvStore;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

fn kv_err(e: redis::RedisError) -> GatewayError {
    GatewayError::KvUnavailable(e.to_string())
}

/// Wraps a `redis::aio::ConnectionManager`, which transparently reconnects
/// on transport failure, so one `RedisKv` can be cloned and shared across
/// every request task.
#[derive(Clone)]
pub struct RedisKv {
    conn: ConnectionManager,
}

impl RedisKv {
    /// Connects to `url` (e.g. `redis://localhost:6379`).
    pub async fn connect(url: &str) -> Result<Self, GatewayError> {
        let client = redis::Client::open(url).map_err(kv_err)?;
        let conn = client.get_connection_manager().await.map_err(kv_err)?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl KvStore for RedisKv {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        let value: i64 = conn.incr(key, 1).await.map_err(kv_err)?;
        if value == 1 {
            let _: () = conn
                .expire(key, ttl.as_secs() as i64)
                .await
                .map_err(kv_err)?;
        }
        Ok(value)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(kv_err)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(kv_err)
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, GatewayError> {
        let mut conn = self.conn.clone();
        conn.incr(key, delta).await.map_err(kv_err)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), GatewayError> {
        let mut conn = self.conn.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(kv_err)
    }

    async fn delete(&self, pattern: &str) -> Result<u64, GatewayError> {
        let keys = self.scan(pattern).await?;
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.clone();
        let deleted: u64 = conn.del(keys).await.map_err(kv_err)?;
        Ok(deleted)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, GatewayError> {
        let mut conn = self.conn.clone();
        let mut iter: redis::AsyncIter<'_, String> =
            conn.scan_match(pattern).await.map_err(kv_err)?;
        let mut keys = Vec::new();
        while let Some(key) = futures_util::StreamExt::next(&mut iter).await {
            keys.push(key);
        }
        Ok(keys)
    }

    async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING")
            .query_async::<String>(&mut conn)
            .await
            .is_ok()
    }

    async fn ttl_seconds(&self, key: &str) -> Result<u64, GatewayError> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.ttl(key).await.map_err(kv_err)?;
        Ok(ttl.max(0) as u64)
    }
}
