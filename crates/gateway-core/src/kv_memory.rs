//! An in-process [`KvStore`] used by tests and by local/dev runs.

use crate::error::GatewayError;
use crate::kv::KvStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        matches!(self.expires_at, Some(t) if Instant::now() >= t)
    }
}

/// A `HashMap`-backed [`KvStore`] with manual per-entry expiry tracking.
///
/// Never returns [`GatewayError::KvUnavailable`] on its own; it exists to
/// let every other component be tested without a running Redis instance.
#[derive(Default)]
pub struct InMemoryKv {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

fn glob_to_prefix(pattern: &str) -> &str {
    // Every caller in this gateway only ever scans/deletes "prefix:*" style
    // patterns (design §6, KV key layout), so a trailing `*` is all this
    // adapter needs to support.
    pattern.strip_suffix('*').unwrap_or(pattern)
}

#[async_trait]
impl KvStore for InMemoryKv {
    async fn incr_with_expiry(&self, key: &str, ttl: Duration) -> Result<i64, GatewayError> {
        let mut entries = self.entries.lock().await;

        let existing = entries.get(key).filter(|e| !e.is_expired());
        let current: i64 = existing
            .map(|e| e.value.parse().unwrap_or(0))
            .unwrap_or(0);
        let next = current + 1;

        let expires_at = if existing.is_some() {
            existing.and_then(|e| e.expires_at)
        } else {
            Some(Instant::now() + ttl)
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn get(&self, key: &str) -> Result<Option<String>, GatewayError> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set_with_ttl(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<(), GatewayError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn incr_by(&self, key: &str, delta: i64) -> Result<i64, GatewayError> {
        let mut entries = self.entries.lock().await;
        let current: i64 = entries
            .get(key)
            .filter(|e| !e.is_expired())
            .map(|e| e.value.parse().unwrap_or(0))
            .unwrap_or(0);
        let next = current + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at: None,
            },
        );
        Ok(next)
    }

    async fn set(&self, key: &str, value: String) -> Result<(), GatewayError> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn delete(&self, pattern: &str) -> Result<u64, GatewayError> {
        let prefix = glob_to_prefix(pattern);
        let mut entries = self.entries.lock().await;
        let keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for k in &keys {
            entries.remove(k);
        }
        Ok(keys.len() as u64)
    }

    async fn scan(&self, pattern: &str) -> Result<Vec<String>, GatewayError> {
        let prefix = glob_to_prefix(pattern);
        let mut entries = self.entries.lock().await;
        let now_expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.is_expired())
            .map(|(k, _)| k.clone())
            .collect();
        for k in now_expired {
            entries.remove(&k);
        }
        Ok(entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn ping(&self) -> bool {
        true
    }

    async fn ttl_seconds(&self, key: &str) -> Result<u64, GatewayError> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if !entry.is_expired() => Ok(entry
                .expires_at
                .map(|t| t.saturating_duration_since(Instant::now()).as_secs())
                .unwrap_or(0)),
            _ => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_increment_sets_ttl_subsequent_increments_preserve_it() {
        let kv = InMemoryKv::new();
        let ttl = Duration::from_secs(60);

        assert_eq!(kv.incr_with_expiry("k", ttl).await.unwrap(), 1);
        let ttl1 = kv.ttl_seconds("k").await.unwrap();
        assert!(ttl1 > 0 && ttl1 <= 60);

        assert_eq!(kv.incr_with_expiry("k", ttl).await.unwrap(), 2);
        let ttl2 = kv.ttl_seconds("k").await.unwrap();
        // TTL should not have been reset to a fresh 60s on the second call.
        assert!(ttl2 <= ttl1);
    }

    #[tokio::test]
    async fn get_set_roundtrip() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.get("missing").await.unwrap(), None);

        kv.set_with_ttl("x", "hello".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(kv.get("x").await.unwrap(), Some("hello".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_are_invisible() {
        let kv = InMemoryKv::new();
        kv.set_with_ttl("x", "v".to_string(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(kv.get("x").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_and_delete_use_prefix_matching() {
        let kv = InMemoryKv::new();
        kv.set_with_ttl("cache:a", "1".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        kv.set_with_ttl("cache:b", "2".to_string(), Duration::from_secs(10))
            .await
            .unwrap();
        kv.set_with_ttl("usage:u1:requests", "3".to_string(), Duration::from_secs(10))
            .await
            .unwrap();

        let mut keys = kv.scan("cache:*").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["cache:a".to_string(), "cache:b".to_string()]);

        let deleted = kv.delete("cache:*").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(kv.scan("cache:*").await.unwrap().len(), 0);
    }

    #[tokio::test]
    async fn ping_always_succeeds() {
        let kv = InMemoryKv::new();
        assert!(kv.ping().await);
    }

    #[tokio::test]
    async fn incr_by_accumulates_without_expiry() {
        let kv = InMemoryKv::new();
        assert_eq!(kv.incr_by("usage:u1:requests", 1).await.unwrap(), 1);
        assert_eq!(kv.incr_by("usage:u1:requests", 4).await.unwrap(), 5);
        assert_eq!(kv.ttl_seconds("usage:u1:requests").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn set_persists_with_no_ttl() {
        let kv = InMemoryKv::new();
        kv.set("k".to_string().as_str(), "v".to_string())
            .await
            .unwrap();
        assert_eq!(kv.get("k").await.unwrap(), Some("v".to_string()));
        assert_eq!(kv.ttl_seconds("k").await.unwrap(), 0);
    }
}
