//! Idempotency cache: `register(key, result, ttl)` inserts
//! `(key -> result)` if absent; `get(key)` returns the cached result or
//! `None`. Used for exactly-once delivery at the HTTP-ingress boundary and
//! as the durable companion to the in-memory LRU in the event consumer.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use serde::{de::DeserializeOwned, Serialize};

use bomenrich_core::CoreError;

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Inserts `key -> value` if absent. Returns `true` if this call won the
    /// race and performed the insert, `false` if a value was already there.
    async fn register_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CoreError>;

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError>;
}

/// Typed convenience wrapper over any `IdempotencyStore`.
pub struct IdempotencyCache<'a> {
    store: &'a dyn IdempotencyStore,
}

impl<'a> IdempotencyCache<'a> {
    pub fn new(store: &'a dyn IdempotencyStore) -> Self {
        Self { store }
    }

    /// Registers `result` under `key` if no value is cached yet. Returns the
    /// value that ends up cached — either `result` (we won) or whatever was
    /// already there (we lost the race, but the caller gets the same answer
    /// either way, which is the point of idempotency).
    pub async fn register<T: Serialize + DeserializeOwned>(
        &self,
        key: &str,
        result: &T,
        ttl: Duration,
    ) -> Result<T, CoreError> {
        let encoded = serde_json::to_vec(result)?;
        let won = self.store.register_raw(key, &encoded, ttl).await?;
        if won {
            return Ok(serde_json::from_slice(&encoded)?);
        }
        match self.store.get_raw(key).await? {
            Some(existing) => Ok(serde_json::from_slice(&existing)?),
            // Lost the race, but the winner's TTL already expired: re-register.
            None => {
                self.store.register_raw(key, &encoded, ttl).await?;
                Ok(serde_json::from_slice(&encoded)?)
            }
        }
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CoreError> {
        match self.store.get_raw(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

pub struct RedisIdempotencyStore {
    pool: deadpool_redis::Pool,
}

impl RedisIdempotencyStore {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdempotencyStore for RedisIdempotencyStore {
    async fn register_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;

        let set: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut conn)
            .await
            .map_err(|e| CoreError::Transient(format!("redis SET NX: {e}")))?;

        Ok(set.is_some())
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;
        let value: Option<Vec<u8>> = conn
            .get(key)
            .await
            .map_err(|e| CoreError::Transient(format!("redis GET: {e}")))?;
        Ok(value)
    }
}

/// In-process idempotency store for tests and the ingress fast-path before
/// falling back to Redis, backed by a `DashMap` hot cache.
pub struct InMemoryIdempotencyStore {
    entries: dashmap::DashMap<String, (Vec<u8>, tokio::time::Instant)>,
}

impl InMemoryIdempotencyStore {
    pub fn new() -> Self {
        Self { entries: dashmap::DashMap::new() }
    }
}

impl Default for InMemoryIdempotencyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn register_raw(&self, key: &str, value: &[u8], ttl: Duration) -> Result<bool, CoreError> {
        use dashmap::mapref::entry::Entry;

        let expired = self
            .entries
            .get(key)
            .map(|e| tokio::time::Instant::now() >= e.1)
            .unwrap_or(true);

        if expired {
            match self.entries.entry(key.to_string()) {
                Entry::Occupied(mut o) => {
                    o.insert((value.to_vec(), tokio::time::Instant::now() + ttl));
                    Ok(true)
                }
                Entry::Vacant(v) => {
                    v.insert((value.to_vec(), tokio::time::Instant::now() + ttl));
                    Ok(true)
                }
            }
        } else {
            Ok(false)
        }
    }

    async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>, CoreError> {
        match self.entries.get(key) {
            Some(entry) if tokio::time::Instant::now() < entry.1 => Ok(Some(entry.0.clone())),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Result_ {
        bom_id: String,
        accepted: bool,
    }

    #[tokio::test]
    async fn register_is_idempotent_across_replays() {
        let store = InMemoryIdempotencyStore::new();
        let cache = IdempotencyCache::new(&store);

        let first = cache
            .register("ingress:abc", &Result_ { bom_id: "bom-1".into(), accepted: true }, Duration::from_secs(60))
            .await
            .unwrap();

        // A replay with a *different* payload still gets the first result back.
        let replay = cache
            .register("ingress:abc", &Result_ { bom_id: "bom-2".into(), accepted: false }, Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(first, replay);
        assert_eq!(first.bom_id, "bom-1");
    }

    #[tokio::test]
    async fn get_returns_none_before_any_register() {
        let store = InMemoryIdempotencyStore::new();
        let cache = IdempotencyCache::new(&store);
        let v: Option<Result_> = cache.get("missing").await.unwrap();
        assert!(v.is_none());
    }

    #[tokio::test]
    async fn entry_expires_after_ttl() {
        let store = InMemoryIdempotencyStore::new();
        let cache = IdempotencyCache::new(&store);
        cache
            .register("k", &Result_ { bom_id: "bom-1".into(), accepted: true }, Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let v: Option<Result_> = cache.get("k").await.unwrap();
        assert!(v.is_none());
    }
}
