use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use super::{Account, AccountStore, GrantFetch, GrantSource, PermissionGrant, SubjectKind};
use crate::database::DatabaseError;
use crate::types::AccountId;

fn poisoned() -> DatabaseError {
    DatabaseError::QueryError("in-memory store lock poisoned".to_string())
}

#[derive(Default)]
pub struct MemoryAccountStore {
    accounts: RwLock<HashMap<AccountId, Account>>,
}

impl MemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) {
        if let Ok(mut accounts) = self.accounts.write() {
            accounts.insert(account.id, account);
        }
    }
}

#[async_trait]
impl AccountStore for MemoryAccountStore {
    async fn find(&self, id: AccountId) -> Result<Option<Account>, DatabaseError> {
        let accounts = self.accounts.read().map_err(|_| poisoned())?;
        Ok(accounts.get(&id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryGrantSource {
    grants: RwLock<Vec<PermissionGrant>>,
    failure: RwLock<Option<String>>,
}

impl MemoryGrantSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, grant: PermissionGrant) {
        if let Ok(mut grants) = self.grants.write() {
            grants.push(grant);
        }
    }

    /// Make every following lookup fail
    pub fn fail_with(&self, message: impl Into<String>) {
        if let Ok(mut failure) = self.failure.write() {
            *failure = Some(message.into());
        }
    }
}

#[async_trait]
impl GrantSource for MemoryGrantSource {
    async fn get_for(&self, subject_ids: &[i64], kind: SubjectKind) -> Result<GrantFetch, DatabaseError> {
        if let Some(message) = self.failure.read().map_err(|_| poisoned())?.clone() {
            return Err(DatabaseError::QueryError(message));
        }

        let grants = self.grants.read().map_err(|_| poisoned())?;
        let matching: Vec<PermissionGrant> = grants
            .iter()
            .filter(|grant| grant.subject == kind && subject_ids.contains(&grant.subject_id))
            .cloned()
            .collect();

        Ok(GrantFetch::from(matching))
    }
}
