//! Named supplier registration with priority ordering: a name -> instance
//! map with an explicit priority/tier assigned at registration time.

use std::collections::HashMap;
use std::sync::Arc;

use crate::adapter::SupplierAdapter;

struct Entry {
    adapter: Arc<dyn SupplierAdapter>,
    priority: u32,
}

/// Holds every configured supplier adapter keyed by name, with a declared
/// priority order (lower = tried first).
#[derive(Default)]
pub struct SupplierRegistry {
    entries: HashMap<String, Entry>,
}

impl SupplierRegistry {
    pub fn new() -> Self {
        Self { entries: HashMap::new() }
    }

    pub fn register(&mut self, adapter: Arc<dyn SupplierAdapter>, priority: u32) {
        let name = adapter.supplier_name().to_string();
        tracing::info!(supplier = %name, priority, "registering supplier adapter");
        self.entries.insert(name, Entry { adapter, priority });
    }

    /// Adapters in ascending priority order (priority 0 tried first).
    pub fn in_priority_order(&self) -> Vec<Arc<dyn SupplierAdapter>> {
        let mut ordered: Vec<&Entry> = self.entries.values().collect();
        ordered.sort_by_key(|e| e.priority);
        ordered.into_iter().map(|e| e.adapter.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn SupplierAdapter>> {
        self.entries.get(name).map(|e| e.adapter.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::SupplierResult;
    use async_trait::async_trait;
    use bomenrich_core::CoreError;

    struct Stub(&'static str);

    #[async_trait]
    impl SupplierAdapter for Stub {
        fn supplier_name(&self) -> &str {
            self.0
        }
        fn rate_limit_per_minute(&self) -> u32 {
            60
        }
        async fn search(&self, _mpn: &str, _manufacturer: Option<&str>) -> Result<SupplierResult, CoreError> {
            unimplemented!()
        }
    }

    #[test]
    fn orders_by_ascending_priority() {
        let mut registry = SupplierRegistry::new();
        registry.register(Arc::new(Stub("element14")), 2);
        registry.register(Arc::new(Stub("mouser")), 0);
        registry.register(Arc::new(Stub("digikey")), 1);

        let names: Vec<String> =
        registry.in_priority_order().iter().map(|a| a.supplier_name().to_string()).collect();
        assert_eq!(names, vec!["mouser", "digikey", "element14"]);
    }
}
