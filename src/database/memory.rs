use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::manager::{ConnectionStatus, DatabaseConnection, DatabaseError};
use super::settings::SettingsStore;

/// Connection stand-in whose status can be flipped at runtime
pub struct MemoryConnection {
    name: String,
    status: RwLock<ConnectionStatus>,
}

impl MemoryConnection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: RwLock::new(ConnectionStatus::Ok),
        }
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        if let Ok(mut current) = self.status.write() {
            *current = status;
        }
    }
}

#[async_trait]
impl DatabaseConnection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn status(&self) -> ConnectionStatus {
        self.status
            .read()
            .map(|status| *status)
            .unwrap_or(ConnectionStatus::Failure)
    }
}

/// Settings table kept in memory
#[derive(Default)]
pub struct MemorySettings {
    values: RwLock<HashMap<i64, String>>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, id: i64, value: impl Into<String>) -> Self {
        self.set(id, value);
        self
    }

    pub fn set(&self, id: i64, value: impl Into<String>) {
        if let Ok(mut values) = self.values.write() {
            values.insert(id, value.into());
        }
    }
}

#[async_trait]
impl SettingsStore for MemorySettings {
    async fn get(&self, ids: &[i64]) -> Result<HashMap<i64, String>, DatabaseError> {
        let values = self
            .values
            .read()
            .map_err(|_| DatabaseError::QueryError("settings lock poisoned".to_string()))?;

        Ok(ids
            .iter()
            .filter_map(|id| values.get(id).map(|value| (*id, value.clone())))
            .collect())
    }
}
