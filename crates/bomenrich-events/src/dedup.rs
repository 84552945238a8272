//! In-memory LRU duplicate-message suppression: bounded at
//! 10,000 entries, FIFO eviction once the 80% watermark is crossed. An
//! order-preserving structure so "oldest 20%" has a well-defined meaning.

use std::collections::VecDeque;

use dashmap::DashSet;

pub struct DedupCache {
    capacity: usize,
    watermark: usize,
    seen: DashSet<String>,
    order: std::sync::Mutex<VecDeque<String>>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            watermark: (capacity as f64 * 0.8) as usize,
            seen: DashSet::new(),
            order: std::sync::Mutex::new(VecDeque::new()),
        }
    }

    pub fn default_sized() -> Self {
        Self::new(10_000)
    }

    /// Returns `true` if `message_id` was already seen (a duplicate).
    /// Otherwise records it and returns `false`.
    pub fn is_duplicate(&self, message_id: &str) -> bool {
        if self.seen.contains(message_id) {
            return true;
        }

        self.seen.insert(message_id.to_string());
        let mut order = self.order.lock().unwrap();
        order.push_back(message_id.to_string());

        if order.len() > self.capacity {
            let to_remove = order.len() - self.watermark;
            for _ in 0..to_remove {
                if let Some(oldest) = order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
        }
        false
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_sighting_of_same_id_is_a_duplicate() {
        let cache = DedupCache::new(10);
        assert!(!cache.is_duplicate("evt-1"));
        assert!(cache.is_duplicate("evt-1"));
    }

    #[test]
    fn evicts_oldest_once_over_capacity() {
        let cache = DedupCache::new(10); // watermark = 8
        for i in 0..12 {
            assert!(!cache.is_duplicate(&format!("evt-{i}")));
        }
        // Eviction trims back down toward the watermark, so the very first
        // ids are gone and reappearing as "new" is expected.
        assert!(!cache.is_duplicate("evt-0"));
        // But a recently-seen id is still recognized as a duplicate.
        assert!(cache.is_duplicate("evt-11"));
    }
}
