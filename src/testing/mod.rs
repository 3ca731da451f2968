// Test doubles shared by the unit tests

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Arc, Mutex};

use crate::account::{Account, MemoryAccountStore, MemoryGrantSource, PermissionGrant};
use crate::app::{Application, RequestContext, Services};
use crate::auth::MemoryAuthenticator;
use crate::config::AppConfig;
use crate::database::{DatabasePool, MemoryConnection, MemorySettings, DEFAULT_LANGUAGE, SITE_NAME};
use crate::error::ApiError;
use crate::event::EventBus;
use crate::handlers::{Handler, HandlerRegistry};
use crate::http::{Request, Response};
use crate::module::{ModuleDescriptor, ModuleManager};
use crate::router::{RouteEntry, RouteTable, Router};
use crate::session::{SessionError, SessionStore};
use crate::types::RouteVerb;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionLog {
    pub saves: usize,
    pub refreshes: usize,
}

/// Session that counts saves and refreshes; the log stays readable after boxing
pub struct RecordingSession {
    id: String,
    values: HashMap<String, Value>,
    expired: bool,
    log: Arc<Mutex<SessionLog>>,
}

impl RecordingSession {
    pub fn new() -> Self {
        Self {
            id: "test-session".to_string(),
            values: HashMap::new(),
            expired: false,
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.values.insert(key.to_string(), value);
        self
    }

    pub fn expired(mut self) -> Self {
        self.expired = true;
        self
    }

    pub fn log(&self) -> SessionLog {
        *self.log.lock().unwrap()
    }

    pub fn log_handle(&self) -> Arc<Mutex<SessionLog>> {
        self.log.clone()
    }
}

#[async_trait]
impl SessionStore for RecordingSession {
    fn id(&self) -> &str {
        &self.id
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    fn set(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    fn remove(&mut self, key: &str) -> bool {
        self.values.remove(key).is_some()
    }

    async fn save(&mut self) -> Result<(), SessionError> {
        self.log.lock().unwrap().saves += 1;
        Ok(())
    }

    fn is_expired(&self) -> bool {
        self.expired
    }

    async fn refresh(&mut self) {
        self.log.lock().unwrap().refreshes += 1;
    }
}

/// Builder for an all in-memory service set
pub struct TestServices {
    config: AppConfig,
    connection: Arc<MemoryConnection>,
    accounts: Arc<MemoryAccountStore>,
    grants: Arc<MemoryGrantSource>,
    settings: Arc<MemorySettings>,
    authenticator: MemoryAuthenticator,
    registry: HandlerRegistry,
    table: RouteTable,
    events: EventBus,
}

impl TestServices {
    pub fn new() -> Self {
        Self {
            config: AppConfig::development(),
            connection: Arc::new(MemoryConnection::new(DatabasePool::PRIMARY)),
            accounts: Arc::new(MemoryAccountStore::new()),
            grants: Arc::new(MemoryGrantSource::new()),
            settings: Arc::new(MemorySettings::new().with(SITE_NAME, "Orange Test").with(DEFAULT_LANGUAGE, "en")),
            authenticator: MemoryAuthenticator::new(),
            registry: HandlerRegistry::with_builtins(),
            table: RouteTable::default(),
            events: EventBus::new(),
        }
    }

    pub fn authenticator(mut self, authenticator: MemoryAuthenticator) -> Self {
        self.authenticator = authenticator;
        self
    }

    pub fn account(self, account: Account) -> Self {
        self.accounts.insert(account);
        self
    }

    pub fn grant(self, grant: PermissionGrant) -> Self {
        self.grants.add(grant);
        self
    }

    pub fn default_language(self, language: &str) -> Self {
        self.settings.set(DEFAULT_LANGUAGE, language);
        self
    }

    pub fn listener<F>(mut self, event: &str, listener: F) -> Self
    where
        F: Fn(&str, &Value) + Send + Sync + 'static,
    {
        self.events.attach(event, listener);
        self
    }

    pub fn module(mut self, name: &str, load: &str) -> Self {
        self.table.modules.push(ModuleDescriptor {
            name: name.to_string(),
            load: load.to_string(),
        });
        self
    }

    /// Register `f` under `id` and route every verb matching `pattern` to it
    pub fn route<F>(mut self, pattern: &str, id: &str, f: F) -> Self
    where
        F: Fn(&mut RequestContext, &Request, &mut Response) -> Result<(), ApiError> + Send + Sync + 'static,
    {
        self.registry.register_fn(id, f);
        self.route_to(pattern, RouteVerb::ANY, id)
    }

    pub fn handler<H: Handler + 'static>(mut self, id: &str, handler: H) -> Self {
        self.registry.register(id, handler);
        self
    }

    pub fn route_to(mut self, pattern: &str, verb: RouteVerb, id: &str) -> Self {
        self.table.routes.push(RouteEntry {
            pattern: pattern.to_string(),
            verb,
            dest: id.to_string(),
        });
        self
    }

    pub fn connection(&self) -> Arc<MemoryConnection> {
        self.connection.clone()
    }

    pub fn build(self) -> Fixture {
        let router = Router::from_table(&self.table, &self.registry).expect("test routes resolve");

        Fixture {
            services: Services {
                config: self.config,
                databases: DatabasePool::with_primary(self.connection),
                router: Arc::new(router),
                modules: Arc::new(ModuleManager::new(self.table.modules)),
                accounts: self.accounts,
                grants: self.grants,
                settings: self.settings,
                authenticator: Arc::new(self.authenticator),
                events: self.events,
            },
        }
    }

    pub fn application(self) -> Application {
        Application::new(self.build().services)
    }
}

/// Built services plus shortcuts for per-request contexts
pub struct Fixture {
    services: Services,
}

impl Fixture {
    pub fn context(&self) -> RequestContext {
        self.context_with(Box::new(RecordingSession::new()))
    }

    pub fn context_with(&self, session: Box<dyn SessionStore>) -> RequestContext {
        let db = self.services.databases.primary().expect("primary connection");
        self.services.context(session, db)
    }
}

impl Deref for Fixture {
    type Target = Services;

    fn deref(&self) -> &Services {
        &self.services
    }
}
