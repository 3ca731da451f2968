use std::fmt;
use std::sync::Arc;

use crate::account::{Account, AccountManager};
use crate::auth::Authenticator;
use crate::cache::CachePool;
use crate::database::{DatabaseConnection, SettingsAccessor};
use crate::event::EventBus;
use crate::module::ActiveModules;
use crate::session::SessionStore;

/// Everything one request works with. Built after the gates pass and
/// dropped when the response is finalized; nothing here outlives the request.
pub struct RequestContext {
    pub session: Box<dyn SessionStore>,
    /// Primary connection checked by the health gate; handlers that talk to
    /// the database go through this handle rather than the pool
    pub db: Arc<dyn DatabaseConnection>,
    pub cache: CachePool,
    pub settings: SettingsAccessor,
    pub events: EventBus,
    pub accounts: AccountManager,
    pub authenticator: Arc<dyn Authenticator>,
    pub modules: ActiveModules,
    pub account: Account,
    pub language: String,
    pub site_name: Option<String>,
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("session", &self.session.id())
            .field("db", &self.db.name())
            .field("account", &self.account.id)
            .field("language", &self.language)
            .field("modules", &self.modules.names())
            .finish()
    }
}
