use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use super::manager::DatabaseError;
use crate::cache::CachePool;

/// Site name setting
pub const SITE_NAME: i64 = 1000000009;

/// Default server language setting
pub const DEFAULT_LANGUAGE: i64 = 1000000029;

/// Database-backed settings table
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Values for the requested ids; unknown ids are absent from the map
    async fn get(&self, ids: &[i64]) -> Result<HashMap<i64, String>, DatabaseError>;
}

/// Per-request settings reader that memoizes through the cache pool
#[derive(Clone)]
pub struct SettingsAccessor {
    store: Arc<dyn SettingsStore>,
}

impl SettingsAccessor {
    pub fn new(store: Arc<dyn SettingsStore>) -> Self {
        Self { store }
    }

    fn cache_key(id: i64) -> String {
        format!("settings:{}", id)
    }

    pub async fn get(
        &self,
        cache: &mut CachePool,
        ids: &[i64],
    ) -> Result<HashMap<i64, String>, DatabaseError> {
        let mut values = HashMap::new();
        let mut missing = Vec::new();

        for id in ids {
            match cache.get(&Self::cache_key(*id)).and_then(Value::as_str) {
                Some(value) => {
                    values.insert(*id, value.to_string());
                }
                None => missing.push(*id),
            }
        }

        if !missing.is_empty() {
            let fetched = self.store.get(&missing).await?;
            for (id, value) in fetched {
                cache.set(Self::cache_key(id), Value::String(value.clone()));
                values.insert(id, value);
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemorySettings;

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let store = Arc::new(MemorySettings::new().with(SITE_NAME, "Orange"));
        let accessor = SettingsAccessor::new(store.clone());
        let mut cache = CachePool::new();

        let first = accessor.get(&mut cache, &[SITE_NAME, DEFAULT_LANGUAGE]).await.unwrap();
        assert_eq!(first.get(&SITE_NAME).map(String::as_str), Some("Orange"));
        assert!(!first.contains_key(&DEFAULT_LANGUAGE));

        store.set(SITE_NAME, "Changed");
        let second = accessor.get(&mut cache, &[SITE_NAME]).await.unwrap();
        assert_eq!(second.get(&SITE_NAME).map(String::as_str), Some("Orange"));
    }
}
