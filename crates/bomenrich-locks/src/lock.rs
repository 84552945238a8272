//! Advisory lock: `acquire(key, ttl, wait_timeout)` with atomic
//! set-if-absent semantics and an owner-id tag; `release(key)` deletes only
//! if the current value still matches the caller's owner-id. Backed by
//! Redis (`SET key value NX EX ttl`, poll-based blocking acquire, delete
//! guarded by owner id) with a `DashMap`-backed in-process store as the
//! test double.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use uuid::Uuid;

use bomenrich_core::CoreError;

/// Keys used across the workspace ("Key schema").
pub mod keys {
    use uuid::Uuid;

    pub fn enrichment(mpn_normalized: &str) -> String {
        format!("enrichment:{mpn_normalized}")
    }

    pub fn bom_workflow(bom_id: Uuid) -> String {
        format!("bom:{bom_id}:workflow")
    }

    pub fn redis_sync(worker_id: &str) -> String {
        format!("redis_sync:{worker_id}")
    }
}

#[async_trait]
pub trait LockStore: Send + Sync {
    /// Atomic set-if-absent with TTL and owner tag. Polls at a fixed interval
    /// until `wait_timeout` elapses if the key is already held.
    async fn acquire(&self, key: &str, ttl: Duration, wait_timeout: Duration) -> Result<Option<LockHandle>, CoreError>;

    /// Deletes `key` only if its current value equals `owner_id`.
    async fn release(&self, key: &str, owner_id: Uuid) -> Result<bool, CoreError>;

    /// Resets `key`'s TTL without changing ownership, failing if another
    /// owner has since taken it. Used by long-running holders that need to
    /// renew a lock before its TTL expires.
    async fn renew(&self, key: &str, owner_id: Uuid, ttl: Duration) -> Result<bool, CoreError>;
}

/// An acquired lock's identity. Dropping this does not release the lock —
/// callers must call `LockStore::release` explicitly, the way the workflow
/// engine frames holding a lock as an explicit activity step rather than an
/// RAII guard, so suspension points stay explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockHandle {
    pub owner_id: Uuid,
}

const POLL_INTERVAL: Duration = Duration::from_millis(100);

pub struct RedisLockStore {
    pool: deadpool_redis::Pool,
}

impl RedisLockStore {
    pub fn new(pool: deadpool_redis::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn acquire(&self, key: &str, ttl: Duration, wait_timeout: Duration) -> Result<Option<LockHandle>, CoreError> {
        let owner_id = Uuid::new_v4();
        let deadline = tokio::time::Instant::now() + wait_timeout;

        loop {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;

            let set: Option<String> = redis::cmd("SET")
                .arg(key)
                .arg(owner_id.to_string())
                .arg("NX")
                .arg("EX")
                .arg(ttl.as_secs().max(1))
                .query_async(&mut conn)
                .await
                .map_err(|e| CoreError::Transient(format!("redis SET NX: {e}")))?;

            if set.is_some() {
                tracing::debug!(lock_key = key, %owner_id, "advisory lock acquired");
                return Ok(Some(LockHandle { owner_id }));
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn release(&self, key: &str, owner_id: Uuid) -> Result<bool, CoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;

        // Compare-and-delete via a Lua script: deleting only matters when we
        // still own the key, and a plain GET-then-DEL would race another
        // acquirer between the two calls.
        const SCRIPT: &str = r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("DEL", KEYS[1])
        else
        return 0
        end
        "#;

        let deleted: i64 = redis::Script::new(SCRIPT)
            .key(key)
            .arg(owner_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoreError::Transient(format!("redis release script: {e}")))?;

        Ok(deleted == 1)
    }

    async fn renew(&self, key: &str, owner_id: Uuid, ttl: Duration) -> Result<bool, CoreError> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;

        const SCRIPT: &str = r#"
        if redis.call("GET", KEYS[1]) == ARGV[1] then
        return redis.call("EXPIRE", KEYS[1], ARGV[2])
        else
        return 0
        end
        "#;

        let renewed: i64 = redis::Script::new(SCRIPT)
            .key(key)
            .arg(owner_id.to_string())
            .arg(ttl.as_secs().max(1))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| CoreError::Transient(format!("redis renew script: {e}")))?;

        Ok(renewed == 1)
    }
}

/// In-process lock store for tests, backed by a `DashMap` hot cache.
pub struct InMemoryLockStore {
    entries: dashmap::DashMap<String, (Uuid, tokio::time::Instant)>,
}

impl InMemoryLockStore {
    pub fn new() -> Self {
        Self { entries: dashmap::DashMap::new() }
    }

    fn is_expired(expires_at: tokio::time::Instant) -> bool {
        tokio::time::Instant::now() >= expires_at
    }
}

impl Default for InMemoryLockStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LockStore for InMemoryLockStore {
    async fn acquire(&self, key: &str, ttl: Duration, wait_timeout: Duration) -> Result<Option<LockHandle>, CoreError> {
        let owner_id = Uuid::new_v4();
        let deadline = tokio::time::Instant::now() + wait_timeout;

        loop {
            let held = self
                .entries
                .get(key)
                .map(|e| !Self::is_expired(e.1))
                .unwrap_or(false);

            if !held {
                self.entries
                    .insert(key.to_string(), (owner_id, tokio::time::Instant::now() + ttl));
                return Ok(Some(LockHandle { owner_id }));
            }

            if tokio::time::Instant::now() >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    async fn release(&self, key: &str, owner_id: Uuid) -> Result<bool, CoreError> {
        if let Some(entry) = self.entries.get(key) {
            if entry.0 == owner_id {
                drop(entry);
                self.entries.remove(key);
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn renew(&self, key: &str, owner_id: Uuid, ttl: Duration) -> Result<bool, CoreError> {
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.0 == owner_id {
                entry.1 = tokio::time::Instant::now() + ttl;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Acquires `keys` (already lexicographically sorted by the caller) one at a
/// time, releasing everything held so far on the first failure (/// "Ordering").
pub async fn acquire_ordered(
    store: &dyn LockStore,
    keys: &[String],
    ttl: Duration,
    wait_timeout: Duration,
) -> Result<Option<Vec<(String, LockHandle)>>, CoreError> {
    let mut sorted = keys.to_vec();
    sorted.sort();

    let mut held = Vec::with_capacity(sorted.len());
    for key in &sorted {
        match store.acquire(key, ttl, wait_timeout).await? {
            Some(handle) => held.push((key.clone(), handle)),
            None => {
                for (k, h) in held.iter().rev() {
                    let _ = store.release(k, h.owner_id).await;
                }
                return Ok(None);
            }
        }
    }
    Ok(Some(held))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquirer_is_blocked_until_release() {
        let store = InMemoryLockStore::new();
        let h1 = store.acquire("enrichment:LM358N|TI", Duration::from_secs(30), Duration::from_millis(50))
            .await
            .unwrap()
            .expect("first caller acquires");

        let blocked = store
            .acquire("enrichment:LM358N|TI", Duration::from_secs(30), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(blocked.is_none());

        assert!(store.release("enrichment:LM358N|TI", h1.owner_id).await.unwrap());

        let h2 = store
            .acquire("enrichment:LM358N|TI", Duration::from_secs(30), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(h2.is_some());
    }

    #[tokio::test]
    async fn release_only_succeeds_for_the_owner() {
        let store = InMemoryLockStore::new();
        let handle = store.acquire("bom:1:workflow", Duration::from_secs(30), Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        assert!(!store.release("bom:1:workflow", Uuid::new_v4()).await.unwrap());
        assert!(store.release("bom:1:workflow", handle.owner_id).await.unwrap());
    }

    #[tokio::test]
    async fn expired_lock_can_be_reacquired_by_someone_else() {
        let store = InMemoryLockStore::new();
        store
            .acquire("redis_sync:worker-1", Duration::from_millis(10), Duration::from_millis(50))
            .await
            .unwrap()
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        let second = store
            .acquire("redis_sync:worker-1", Duration::from_secs(30), Duration::from_millis(50))
            .await
            .unwrap();
        assert!(second.is_some());
    }

    #[tokio::test]
    async fn ordered_acquire_releases_all_on_partial_failure() {
        let store = InMemoryLockStore::new();
        // Pre-hold "b" so the ordered acquire of [a, b] fails on the second key.
        store.acquire("b", Duration::from_secs(30), Duration::from_millis(10)).await.unwrap();

        let result = acquire_ordered(
            &store,
            &["b".to_string(), "a".to_string()],
            Duration::from_secs(30),
            Duration::from_millis(20),
        )
            .await
            .unwrap();
        assert!(result.is_none());

        // "a" must have been released again since the whole batch failed.
        let reacquire_a = store.acquire("a", Duration::from_secs(30), Duration::from_millis(10)).await.unwrap();
        assert!(reacquire_a.is_some());
    }

    #[tokio::test]
    async fn renew_extends_ttl_for_the_owner_only() {
        let store = InMemoryLockStore::new();
        let handle = store
            .acquire("bom:1:workflow", Duration::from_millis(50), Duration::from_millis(10))
            .await
            .unwrap()
            .unwrap();
        assert!(store.renew("bom:1:workflow", handle.owner_id, Duration::from_secs(30)).await.unwrap());
        assert!(!store.renew("bom:1:workflow", Uuid::new_v4(), Duration::from_secs(30)).await.unwrap());
    }
}
