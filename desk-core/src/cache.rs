use crate::store::Cache;
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// In-process TTL cache. Entries expire lazily on read; a session-view or
/// field-config entry that is never touched again just sits until the next
/// lookup or overwrite.
#[derive(Default)]
pub struct MemoryCache {
    entries: DashMap<String, (serde_json::Value, Instant)>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                let (value, deadline) = entry.value();
                if Instant::now() < *deadline {
                    return Some(value.clone());
                }
                true
            }
            None => false,
        };
        if expired {
            self.entries.remove(key);
        }
        None
    }

    fn set(&self, key: &str, value: serde_json::Value, ttl: Duration) {
        self.entries
            .insert(key.to_string(), (value, Instant::now() + ttl));
    }

    fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }
}
