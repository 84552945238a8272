//! Distributed Lock + Idempotency Store.

pub mod idempotency;
pub mod lock;

pub use idempotency::{IdempotencyCache, IdempotencyStore, InMemoryIdempotencyStore, RedisIdempotencyStore};
pub use lock::{acquire_ordered, keys, InMemoryLockStore, LockHandle, LockStore, RedisLockStore};
