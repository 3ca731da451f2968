use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{error, info, warn};

use crate::types::AccountId;

/// Result of a credential check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    Ok(AccountId),
    Failure,
    WrongPassword,
    WrongUsername,
    NotActivated,
    Inactive,
}

impl LoginOutcome {
    /// Codes at or above this value are successful logins
    pub const OK_THRESHOLD: i64 = 0;

    /// Success yields the account id, failures are negative
    pub fn code(&self) -> i64 {
        match self {
            LoginOutcome::Ok(id) => *id,
            LoginOutcome::Failure => -1,
            LoginOutcome::WrongPassword => -2,
            LoginOutcome::WrongUsername => -3,
            LoginOutcome::NotActivated => -5,
            LoginOutcome::Inactive => -9,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code() >= Self::OK_THRESHOLD
    }

    /// Account id to bind to the session on success
    pub fn account(&self) -> Option<AccountId> {
        match self {
            LoginOutcome::Ok(id) if self.is_ok() => Some(*id),
            _ => None,
        }
    }
}

/// Digest stored in `account.account_password`: lowercase hex of one unsalted
/// SHA-256 round. This is the legacy table format and is only fit for
/// verifying existing rows; a salted KDF needs a schema migration first.
pub fn hash_password(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, user: &str, pass: &str) -> LoginOutcome;
}

#[derive(Debug, Clone)]
struct Credential {
    id: AccountId,
    digest: String,
    active: bool,
}

/// Credentials held in memory
#[derive(Default)]
pub struct MemoryAuthenticator {
    credentials: RwLock<HashMap<String, Credential>>,
}

impl MemoryAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, login: &str, password: &str, id: AccountId) -> Self {
        self.add_user(login, password, id, true);
        self
    }

    pub fn add_user(&self, login: &str, password: &str, id: AccountId, active: bool) {
        if let Ok(mut credentials) = self.credentials.write() {
            credentials.insert(
                login.to_string(),
                Credential {
                    id,
                    digest: hash_password(password),
                    active,
                },
            );
        }
    }
}

#[async_trait]
impl Authenticator for MemoryAuthenticator {
    async fn login(&self, user: &str, pass: &str) -> LoginOutcome {
        let credential = match self.credentials.read() {
            Ok(credentials) => credentials.get(user).cloned(),
            Err(_) => return LoginOutcome::Failure,
        };

        match credential {
            None => LoginOutcome::WrongUsername,
            Some(c) if c.digest != hash_password(pass) => LoginOutcome::WrongPassword,
            Some(c) if !c.active => LoginOutcome::Inactive,
            Some(c) => LoginOutcome::Ok(c.id),
        }
    }
}

/// Checks credentials against the `account` table
pub struct PgAuthenticator {
    pool: PgPool,
}

impl PgAuthenticator {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Authenticator for PgAuthenticator {
    async fn login(&self, user: &str, pass: &str) -> LoginOutcome {
        let row = sqlx::query(
            "SELECT account_id, account_password, account_status FROM account WHERE account_login = $1",
        )
        .bind(user)
        .fetch_optional(&self.pool)
        .await;

        let row = match row {
            Ok(Some(row)) => row,
            Ok(None) => return LoginOutcome::WrongUsername,
            Err(e) => {
                error!("Login lookup for '{}' failed: {}", user, e);
                return LoginOutcome::Failure;
            }
        };

        let fields = (
            row.try_get::<i64, _>("account_id"),
            row.try_get::<Option<String>, _>("account_password"),
            row.try_get::<i32, _>("account_status"),
        );

        match fields {
            (Ok(id), Ok(Some(digest)), Ok(status)) => {
                if digest != hash_password(pass) {
                    warn!("Wrong password for '{}'", user);
                    LoginOutcome::WrongPassword
                } else if status != 1 {
                    LoginOutcome::Inactive
                } else {
                    info!("Account {} logged in", id);
                    LoginOutcome::Ok(id)
                }
            }
            (Ok(_), Ok(None), _) => LoginOutcome::NotActivated,
            _ => {
                error!("Malformed account row for '{}'", user);
                LoginOutcome::Failure
            }
        }
    }
}
