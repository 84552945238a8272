//! Catalog + Redis Snapshot: the canonical component store, the
//! quarantine cache, and the promotion protocol joining them.

pub mod catalog;
pub mod promotion;
pub mod snapshot;

pub use catalog::{CatalogStore, UpsertOutcome};
pub use promotion::{classify, PromotionRoute};
pub use snapshot::{default_hard_delete_after, run_sync_loop, RedisSnapshotStore};
