pub mod context;
pub mod pipeline;

use anyhow::Context;
use std::sync::Arc;
use tracing::{info, warn};

use crate::account::{Account, AccountManager, AccountStore, GrantSource, MemoryAccountStore, MemoryGrantSource};
use crate::auth::{Authenticator, MemoryAuthenticator, PgAuthenticator};
use crate::cache::CachePool;
use crate::config::AppConfig;
use crate::database::{
    DatabaseConnection, DatabasePool, MemoryConnection, MemorySettings, PgAccountStore, PgConnection,
    PgGrantSource, PgSettings, SettingsAccessor, SettingsStore, DEFAULT_LANGUAGE, SITE_NAME,
};
use crate::event::EventBus;
use crate::handlers::HandlerRegistry;
use crate::module::{ActiveModules, ModuleManager};
use crate::router::{RouteTable, Router};
use crate::session::SessionStore;

pub use context::RequestContext;
pub use pipeline::{PipelineOutcome, Stage};

/// Long-lived collaborators shared by every request
pub struct Services {
    pub config: AppConfig,
    pub databases: DatabasePool,
    pub router: Arc<Router>,
    pub modules: Arc<ModuleManager>,
    pub accounts: Arc<dyn AccountStore>,
    pub grants: Arc<dyn GrantSource>,
    pub settings: Arc<dyn SettingsStore>,
    pub authenticator: Arc<dyn Authenticator>,
    pub events: EventBus,
}

impl Services {
    /// Load the route file and pick Postgres or in-memory stores depending on `DATABASE_URL`
    pub fn from_config(config: AppConfig, registry: &HandlerRegistry) -> anyhow::Result<Self> {
        let table = RouteTable::load(&config.routing.route_file)
            .with_context(|| format!("loading routes from {}", config.routing.route_file))?;
        let router = Router::from_table(&table, registry)?;
        let modules = ModuleManager::new(table.modules.clone());

        let services = match config.database.url.clone() {
            Some(url) => {
                let connection = PgConnection::connect_lazy(DatabasePool::PRIMARY, &url, &config.database)?;
                let pool = connection.pool().clone();

                Self {
                    databases: DatabasePool::with_primary(Arc::new(connection)),
                    router: Arc::new(router),
                    modules: Arc::new(modules),
                    accounts: Arc::new(PgAccountStore::new(pool.clone())),
                    grants: Arc::new(PgGrantSource::new(pool.clone())),
                    settings: Arc::new(PgSettings::new(pool.clone())),
                    authenticator: Arc::new(PgAuthenticator::new(pool)),
                    events: EventBus::new(),
                    config,
                }
            }
            None => {
                warn!("DATABASE_URL not set, using in-memory stores");
                let settings = MemorySettings::new()
                    .with(SITE_NAME, "Orange Management")
                    .with(DEFAULT_LANGUAGE, config.localization.default_language.clone());

                Self {
                    databases: DatabasePool::with_primary(Arc::new(MemoryConnection::new(DatabasePool::PRIMARY))),
                    router: Arc::new(router),
                    modules: Arc::new(modules),
                    accounts: Arc::new(MemoryAccountStore::new()),
                    grants: Arc::new(MemoryGrantSource::new()),
                    settings: Arc::new(settings),
                    authenticator: Arc::new(MemoryAuthenticator::new()),
                    events: EventBus::new(),
                    config,
                }
            }
        };

        info!(
            "Services ready: {} routes, {} modules, databases {:?}",
            services.router.len(),
            services.modules.descriptors().len(),
            services.databases.names()
        );
        Ok(services)
    }

    /// Fresh per-request context bound to `db`
    pub fn context(&self, session: Box<dyn SessionStore>, db: Arc<dyn DatabaseConnection>) -> RequestContext {
        RequestContext {
            session,
            db,
            cache: CachePool::new(),
            settings: SettingsAccessor::new(self.settings.clone()),
            events: self.events.clone(),
            accounts: AccountManager::new(self.accounts.clone(), self.grants.clone()),
            authenticator: self.authenticator.clone(),
            modules: ActiveModules::new(),
            account: Account::guest(),
            language: self.config.localization.default_language.clone(),
            site_name: None,
        }
    }
}

/// Cheap to clone; one per server
#[derive(Clone)]
pub struct Application {
    services: Arc<Services>,
}

impl Application {
    pub fn new(services: Services) -> Self {
        Self {
            services: Arc::new(services),
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &AppConfig {
        &self.services.config
    }
}
