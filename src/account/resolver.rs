use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{
    Account, AccountError, AccountStore, GrantSource, PermissionGrant, PermissionSet, SubjectKind,
};
use crate::types::{is_authenticated, AccountId};

/// Loads accounts and assembles their permission sets. One per request.
pub struct AccountManager {
    accounts: Arc<dyn AccountStore>,
    grants: Arc<dyn GrantSource>,
    loaded: HashMap<AccountId, Account>,
}

impl AccountManager {
    pub fn new(accounts: Arc<dyn AccountStore>, grants: Arc<dyn GrantSource>) -> Self {
        Self {
            accounts,
            grants,
            loaded: HashMap::new(),
        }
    }

    /// Fetch the account record; a missing id is a hard error.
    /// Callers handle the guest id themselves.
    pub async fn load_account(&self, id: AccountId) -> Result<Account, AccountError> {
        self.accounts
            .find(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    /// Union of the grants of every group the account is in and the account's own grants.
    /// Lookup failures degrade to an empty contribution.
    pub async fn resolve_permissions(&self, account: &Account) -> PermissionSet {
        let group_ids = account.group_ids();

        let group_grants = if group_ids.is_empty() {
            Vec::new()
        } else {
            self.fetch_grants(&group_ids, SubjectKind::Group).await
        };

        let account_grants = self.fetch_grants(&[account.id], SubjectKind::Account).await;

        let group_set: PermissionSet = group_grants.into_iter().collect();
        let account_set: PermissionSet = account_grants.into_iter().collect();

        group_set.union(account_set)
    }

    async fn fetch_grants(&self, subject_ids: &[i64], kind: SubjectKind) -> Vec<PermissionGrant> {
        match self.grants.get_for(subject_ids, kind).await {
            Ok(fetch) => fetch.into_vec(),
            Err(e) => {
                warn!(
                    "Permission lookup for {:?} {:?} failed, continuing without: {}",
                    kind, subject_ids, e
                );
                Vec::new()
            }
        }
    }

    /// Fully resolved account, memoized for the lifetime of the manager
    pub async fn get(&mut self, id: AccountId) -> Result<Account, AccountError> {
        if !is_authenticated(id) {
            return Ok(Account::guest());
        }

        if let Some(account) = self.loaded.get(&id) {
            return Ok(account.clone());
        }

        let mut account = self.load_account(id).await?;
        let permissions = self.resolve_permissions(&account).await;

        for grant in permissions.iter().filter(|g| g.subject == SubjectKind::Group) {
            if let Some(group) = account.groups.get_mut(&grant.subject_id) {
                group.permissions.push(grant.clone());
            }
        }
        account.permissions = permissions;

        debug!(
            "Loaded account {} with {} groups and {} grants",
            account.id,
            account.groups.len(),
            account.permissions.len()
        );

        self.loaded.insert(id, account.clone());
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::{Group, MemoryAccountStore, MemoryGrantSource, PermissionScope};
    use crate::types::PermissionAction;

    fn fixture() -> (Arc<MemoryAccountStore>, Arc<MemoryGrantSource>) {
        let accounts = Arc::new(MemoryAccountStore::new());
        accounts.insert(
            Account::new(5, "admin")
                .with_group(Group::new(1, "admin"))
                .with_group(Group::new(2, "editors").inactive()),
        );
        accounts.insert(Account::new(6, "lonely"));

        let grants = Arc::new(MemoryGrantSource::new());
        grants.add(PermissionGrant::for_group(1, PermissionAction::READ).with_module("Admin"));
        grants.add(PermissionGrant::for_group(2, PermissionAction::MODIFY).with_module("News"));
        grants.add(PermissionGrant::for_account(5, PermissionAction::DELETE).with_module("News"));
        // duplicate of a group grant, reached through the account instead
        grants.add(PermissionGrant::for_account(5, PermissionAction::READ).with_module("Admin"));

        (accounts, grants)
    }

    #[tokio::test]
    async fn permissions_are_union_of_group_and_direct_grants() {
        let (accounts, grants) = fixture();
        let manager = AccountManager::new(accounts, grants);

        let account = manager.load_account(5).await.unwrap();
        let set = manager.resolve_permissions(&account).await;

        assert_eq!(set.len(), 4);
        let scope = PermissionScope::new().module("News");
        assert!(set.has_permission(PermissionAction::MODIFY, &scope));
        assert!(set.has_permission(PermissionAction::DELETE, &scope));
    }

    #[tokio::test]
    async fn account_without_groups_gets_direct_grants_only() {
        let (accounts, grants) = fixture();
        grants.add(PermissionGrant::for_account(6, PermissionAction::CREATE));
        let mut manager = AccountManager::new(accounts, grants);

        let account = manager.get(6).await.unwrap();
        assert_eq!(account.permissions.len(), 1);
    }

    #[tokio::test]
    async fn missing_account_is_a_hard_error() {
        let (accounts, grants) = fixture();
        let mut manager = AccountManager::new(accounts, grants);

        assert!(matches!(manager.get(99).await, Err(AccountError::NotFound(99))));
    }

    #[tokio::test]
    async fn guest_never_touches_the_store() {
        let (accounts, grants) = fixture();
        let mut manager = AccountManager::new(accounts, grants);

        let guest = manager.get(0).await.unwrap();
        assert!(guest.is_guest());
    }

    #[tokio::test]
    async fn failing_grant_source_yields_empty_set() {
        let (accounts, grants) = fixture();
        grants.fail_with("connection reset");
        let mut manager = AccountManager::new(accounts, grants);

        let account = manager.get(5).await.unwrap();
        assert!(account.permissions.is_empty());
        assert_eq!(account.groups.len(), 2);
    }

    #[tokio::test]
    async fn group_grants_are_attached_to_groups() {
        let (accounts, grants) = fixture();
        let mut manager = AccountManager::new(accounts, grants);

        let account = manager.get(5).await.unwrap();
        assert_eq!(account.groups[&1].permissions.len(), 1);
        assert_eq!(account.groups[&2].permissions.len(), 1);
    }
}
