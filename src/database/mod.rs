pub mod manager;
pub mod memory;
pub mod postgres;
pub mod settings;

pub use manager::{ConnectionStatus, DatabaseConnection, DatabaseError, DatabasePool, PgConnection};
pub use memory::{MemoryConnection, MemorySettings};
pub use postgres::{PgAccountStore, PgGrantSource, PgSettings};
pub use settings::{SettingsAccessor, SettingsStore, DEFAULT_LANGUAGE, SITE_NAME};
