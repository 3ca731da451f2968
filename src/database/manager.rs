use async_trait::async_trait;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::DatabaseConfig;

/// Errors from the database layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Query error: {0}")]
    QueryError(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Health of a single connection as seen by the request gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Ok,
    MissingDatabase,
    MissingTable,
    Failure,
    ReadOnly,
    Closed,
}

impl ConnectionStatus {
    pub fn is_ok(self) -> bool {
        self == ConnectionStatus::Ok
    }
}

/// A named connection the data-access layer can be bound to
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    fn name(&self) -> &str;

    async fn status(&self) -> ConnectionStatus;
}

/// Postgres connection backed by a lazily connecting sqlx pool
pub struct PgConnection {
    name: String,
    pool: PgPool,
}

impl PgConnection {
    pub fn connect_lazy(
        name: impl Into<String>,
        url: &str,
        config: &DatabaseConfig,
    ) -> Result<Self, DatabaseError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect_lazy(url)?;

        let name = name.into();
        info!("Created database pool for: {}", name);

        Ok(Self { name, pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl DatabaseConnection for PgConnection {
    fn name(&self) -> &str {
        &self.name
    }

    /// Pings the pool to ensure connectivity
    async fn status(&self) -> ConnectionStatus {
        if self.pool.is_closed() {
            return ConnectionStatus::Closed;
        }

        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => ConnectionStatus::Ok,
            Err(sqlx::Error::Database(db_err)) => {
                warn!("Database '{}' health check failed: {}", self.name, db_err);
                match db_err.code().as_deref() {
                    Some("3D000") => ConnectionStatus::MissingDatabase,
                    Some("42P01") => ConnectionStatus::MissingTable,
                    Some("25006") => ConnectionStatus::ReadOnly,
                    _ => ConnectionStatus::Failure,
                }
            }
            Err(sqlx::Error::PoolClosed) => ConnectionStatus::Closed,
            Err(e) => {
                warn!("Database '{}' health check failed: {}", self.name, e);
                ConnectionStatus::Failure
            }
        }
    }
}

/// Named connections with a designated primary
#[derive(Clone, Default)]
pub struct DatabasePool {
    connections: HashMap<String, Arc<dyn DatabaseConnection>>,
}

impl DatabasePool {
    /// Name of the primary connection every request is gated on
    pub const PRIMARY: &'static str = "core";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_primary(connection: Arc<dyn DatabaseConnection>) -> Self {
        let mut pool = Self::new();
        pool.add(Self::PRIMARY, connection);
        pool
    }

    /// Register a connection; an existing name is left untouched
    pub fn add(&mut self, name: &str, connection: Arc<dyn DatabaseConnection>) -> bool {
        if self.connections.contains_key(name) {
            return false;
        }

        self.connections.insert(name.to_string(), connection);
        true
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn DatabaseConnection>> {
        self.connections.get(name).cloned()
    }

    pub fn primary(&self) -> Option<Arc<dyn DatabaseConnection>> {
        self.get(Self::PRIMARY)
    }

    /// Status of the primary connection; a missing primary counts as closed
    pub async fn primary_status(&self) -> ConnectionStatus {
        match self.primary() {
            Some(connection) => connection.status().await,
            None => ConnectionStatus::Closed,
        }
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.connections.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
