//! Redis quarantine snapshot and its periodic sync worker. Scans
//! `component:*:data` keys, upserts into the durable mirror table, expires
//! stale rows, and hard-deletes after 7 days. The worker holds a single
//! global advisory lock so only one replica runs a sync pass at a time;
//! failure to acquire it silently skips the run (not an error).

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use redis::AsyncCommands;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use bomenrich_core::{CoreError, RedisSnapshot, SnapshotSyncStatus};
use bomenrich_locks::{keys, LockStore};

pub struct RedisSnapshotStore {
    redis: deadpool_redis::Pool,
    pg: PgPool,
}

const COMPONENT_KEY_PATTERN: &str = "component:*:data";

impl RedisSnapshotStore {
    pub fn new(redis: deadpool_redis::Pool, pg: PgPool) -> Self {
        Self { redis, pg }
    }

    /// Writes a staging or rejected snapshot with the given TTL. `reason` is
    /// set only for rejected snapshots.
    pub async fn write(&self, snapshot: &RedisSnapshot, ttl: Duration) -> Result<(), CoreError> {
        let mut conn = self
            .redis
            .get()
            .await
            .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;

        let payload = serde_json::to_string(&SnapshotPayload::from(snapshot))?;
        let _: () = conn
            .set_ex(&snapshot.redis_key, payload, ttl.as_secs().max(1))
            .await
            .map_err(|e| CoreError::Transient(format!("redis SETEX: {e}")))?;
        Ok(())
    }

    /// Marks a staging snapshot `promoted` after the caller has run it
    /// through the catalog upsert ("Manual promotion").
    pub async fn mark_promoted(&self, redis_key: &str) -> Result<(), CoreError> {
        sqlx::query("UPDATE redis_component_snapshot SET sync_status = 'promoted' WHERE redis_key = $1")
            .bind(redis_key)
            .execute(&self.pg)
            .await
            .map_err(CoreError::Database)?;
        Ok(())
    }

    /// One sync pass: scan Redis, upsert the durable mirror,
    /// expire past-due rows, hard-delete rows expired more than 7 days.
    /// Returns the number of keys scanned, or `None` if the global lock was
    /// already held elsewhere (the caller should simply skip and retry next
    /// tick).
    pub async fn sync_once(
        &self,
        locks: &dyn LockStore,
        worker_id: &str,
        lock_ttl: Duration,
        hard_delete_after: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Result<Option<usize>, CoreError> {
        let lock_key = keys::redis_sync(worker_id);
        let handle = match locks.acquire(&lock_key, lock_ttl, Duration::from_millis(50)).await? {
            Some(h) => h,
            None => {
                tracing::debug!(worker_id, "redis sync lock held elsewhere, skipping run");
                return Ok(None);
            }
        };

        let result = self.do_sync(now).await;

        let _ = locks.release(&lock_key, handle.owner_id).await;

        let scanned = result?;
        self.expire_past_due(now).await?;
        self.hard_delete_stale(now, hard_delete_after).await?;
        Ok(Some(scanned))
    }

    async fn do_sync(&self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let mut conn = self
            .redis
            .get()
            .await
            .map_err(|e| CoreError::Transient(format!("redis pool: {e}")))?;

        let mut cursor = 0u64;
        let mut scanned = 0usize;

        loop {
            let (next_cursor, keys_batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(COMPONENT_KEY_PATTERN)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await
                .map_err(|e| CoreError::Transient(format!("redis SCAN: {e}")))?;

            for key in &keys_batch {
                if let Some(raw) = conn
                    .get::<_, Option<String>>(key)
                    .await
                    .map_err(|e| CoreError::Transient(format!("redis GET {key}: {e}")))?
                {
                    if let Ok(payload) = serde_json::from_str::<SnapshotPayload>(&raw) {
                        self.upsert_mirror(key, &payload, now).await?;
                        scanned += 1;
                    }
                }
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(scanned)
    }

    async fn upsert_mirror(&self, redis_key: &str, payload: &SnapshotPayload, now: DateTime<Utc>) -> Result<(), CoreError> {
        let sync_status = if payload.expires_at <= now { "expired" } else { "active" };

        sqlx::query(
            "INSERT INTO redis_component_snapshot \
            (redis_key, line_id, mpn, manufacturer, quality_score, component_data, expires_at, sync_status, reason) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
            ON CONFLICT (redis_key) DO UPDATE SET \
            quality_score = EXCLUDED.quality_score, \
            component_data = EXCLUDED.component_data, \
            expires_at = EXCLUDED.expires_at, \
            sync_status = EXCLUDED.sync_status, \
            reason = EXCLUDED.reason",
        )
            .bind(redis_key)
            .bind(payload.line_id)
            .bind(&payload.mpn)
            .bind(&payload.manufacturer)
            .bind(payload.quality_score as i16)
            .bind(&payload.component_data)
            .bind(payload.expires_at)
            .bind(sync_status)
            .bind(&payload.reason)
            .execute(&self.pg)
            .await
            .map_err(CoreError::Database)?;
        Ok(())
    }

    async fn expire_past_due(&self, now: DateTime<Utc>) -> Result<(), CoreError> {
        sqlx::query(
            "UPDATE redis_component_snapshot SET sync_status = 'expired' \
            WHERE sync_status = 'active' AND expires_at <= $1",
        )
            .bind(now)
            .execute(&self.pg)
            .await
            .map_err(CoreError::Database)?;
        Ok(())
    }

    async fn hard_delete_stale(&self, now: DateTime<Utc>, hard_delete_after: ChronoDuration) -> Result<u64, CoreError> {
        let cutoff = now - hard_delete_after;
        let result = sqlx::query(
            "DELETE FROM redis_component_snapshot WHERE sync_status = 'expired' AND expires_at <= $1",
        )
            .bind(cutoff)
            .execute(&self.pg)
            .await
            .map_err(CoreError::Database)?;
        Ok(result.rows_affected())
    }
}

#[derive(serde::Serialize, serde::Deserialize, FromRow)]
struct SnapshotPayload {
    line_id: Uuid,
    mpn: String,
    manufacturer: String,
    quality_score: i16,
    component_data: serde_json::Value,
    expires_at: DateTime<Utc>,
    reason: Option<String>,
}

impl From<&RedisSnapshot> for SnapshotPayload {
    fn from(s: &RedisSnapshot) -> Self {
        Self {
            line_id: s.line_id,
            mpn: s.mpn.clone(),
            manufacturer: s.manufacturer.clone(),
            quality_score: s.quality_score as i16,
            component_data: s.component_data.clone(),
            expires_at: s.expires_at,
            reason: s.reason.clone(),
        }
    }
}

pub fn default_hard_delete_after() -> ChronoDuration {
    ChronoDuration::days(7)
}

/// Runs `sync_once` forever at `interval`, the periodic-worker loop shape
/// ("every 15s"). Intended to be spawned as a long-running task.
pub async fn run_sync_loop(store: Arc<RedisSnapshotStore>, locks: Arc<dyn LockStore>, worker_id: String, interval: Duration, lock_ttl: Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match store.sync_once(locks.as_ref(), &worker_id, lock_ttl, default_hard_delete_after(), Utc::now()).await {
            Ok(Some(count)) => tracing::info!(worker_id = %worker_id, count, "redis snapshot sync complete"),
            Ok(None) => {}
            Err(err) => tracing::error!(worker_id = %worker_id, error = %err, "redis snapshot sync failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_enum_has_three_states_matching_spec() {
        let states = [SnapshotSyncStatus::Active, SnapshotSyncStatus::Expired, SnapshotSyncStatus::Promoted];
        assert_eq!(states.len(), 3);
    }
}
