pub mod login;

use serde_json::Value;
use tracing::debug;

use crate::session::{SessionStore, UID};
use crate::types::{is_authenticated, AccountId, GUEST_ACCOUNT};

pub use login::{hash_password, Authenticator, LoginOutcome, MemoryAuthenticator, PgAuthenticator};

/// Resolve the account bound to the session. Anything short of a live
/// session holding a positive UID is the guest; that is not an error.
/// Authenticated sessions have their idle timeout restarted in the store.
pub async fn authenticate(session: &mut dyn SessionStore) -> AccountId {
    if session.is_expired() {
        debug!("Session {} expired, treating as guest", session.id());
        return GUEST_ACCOUNT;
    }

    let id = match session.get(UID) {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };

    match id {
        Some(id) if is_authenticated(id) => {
            session.refresh().await;
            id
        }
        _ => GUEST_ACCOUNT,
    }
}
