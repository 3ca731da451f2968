use serde_json::Value;
use std::collections::HashMap;

/// Request-scoped key/value cache
#[derive(Debug, Default)]
pub struct CachePool {
    entries: HashMap<String, Value>,
    hits: u64,
    misses: u64,
}

impl CachePool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, key: &str) -> Option<&Value> {
        match self.entries.get(key) {
            Some(value) => {
                self.hits += 1;
                Some(value)
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// (hits, misses)
    pub fn stats(&self) -> (u64, u64) {
        (self.hits, self.misses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn counts_hits_and_misses() {
        let mut cache = CachePool::new();
        assert!(cache.get("a").is_none());
        cache.set("a", json!(1));
        assert_eq!(cache.get("a"), Some(&json!(1)));
        assert_eq!(cache.stats(), (1, 1));
        assert_eq!(cache.remove("a"), Some(json!(1)));
        assert!(cache.is_empty());
    }
}
