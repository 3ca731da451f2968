pub mod memory;
pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::database::DatabaseError;
use crate::types::{AccountId, PermissionAction, GUEST_ACCOUNT};

pub use memory::{MemoryAccountStore, MemoryGrantSource};
pub use resolver::AccountManager;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("Account {0} not found")]
    NotFound(AccountId),

    #[error(transparent)]
    Store(#[from] DatabaseError),
}

/// Who a grant is attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectKind {
    Group,
    Account,
}

/// A single permission assignment. Unset scope fields act as wildcards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionGrant {
    pub subject: SubjectKind,
    pub subject_id: i64,
    #[serde(default)]
    pub unit: Option<i64>,
    #[serde(default)]
    pub app: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default, rename = "type")]
    pub category: Option<i64>,
    #[serde(default)]
    pub element: Option<i64>,
    #[serde(default)]
    pub component: Option<i64>,
    pub actions: PermissionAction,
}

impl PermissionGrant {
    pub fn new(subject: SubjectKind, subject_id: i64, actions: PermissionAction) -> Self {
        Self {
            subject,
            subject_id,
            unit: None,
            app: None,
            module: None,
            from: None,
            category: None,
            element: None,
            component: None,
            actions,
        }
    }

    pub fn for_group(group_id: i64, actions: PermissionAction) -> Self {
        Self::new(SubjectKind::Group, group_id, actions)
    }

    pub fn for_account(account_id: AccountId, actions: PermissionAction) -> Self {
        Self::new(SubjectKind::Account, account_id, actions)
    }

    pub fn with_unit(mut self, unit: i64) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn with_module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    pub fn with_type(mut self, category: i64) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_element(mut self, element: i64) -> Self {
        self.element = Some(element);
        self
    }

    pub fn with_component(mut self, component: i64) -> Self {
        self.component = Some(component);
        self
    }

    /// True when this grant allows `actions` within `scope`
    pub fn allows(&self, actions: PermissionAction, scope: &PermissionScope) -> bool {
        fn fits<T: PartialEq>(granted: &Option<T>, wanted: &Option<T>) -> bool {
            match (granted, wanted) {
                (_, None) | (None, _) => true,
                (Some(granted), Some(wanted)) => granted == wanted,
            }
        }

        self.actions.contains(actions)
            && fits(&self.unit, &scope.unit)
            && fits(&self.app, &scope.app)
            && fits(&self.module, &scope.module)
            && fits(&self.from, &scope.from)
            && fits(&self.category, &scope.category)
            && fits(&self.element, &scope.element)
            && fits(&self.component, &scope.component)
    }
}

/// Resource a permission check is made against
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionScope {
    pub unit: Option<i64>,
    pub app: Option<String>,
    pub module: Option<String>,
    pub from: Option<String>,
    pub category: Option<i64>,
    pub element: Option<i64>,
    pub component: Option<i64>,
}

impl PermissionScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unit(mut self, unit: i64) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn module(mut self, module: impl Into<String>) -> Self {
        self.module = Some(module.into());
        self
    }

    pub fn category(mut self, category: i64) -> Self {
        self.category = Some(category);
        self
    }

    pub fn element(mut self, element: i64) -> Self {
        self.element = Some(element);
        self
    }
}

/// Duplicate-free grant collection with union semantics
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct PermissionSet {
    grants: Vec<PermissionGrant>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an identical grant is already present
    pub fn insert(&mut self, grant: PermissionGrant) -> bool {
        if self.grants.contains(&grant) {
            return false;
        }

        self.grants.push(grant);
        true
    }

    pub fn union(mut self, other: PermissionSet) -> PermissionSet {
        self.extend(other.grants);
        self
    }

    pub fn contains(&self, grant: &PermissionGrant) -> bool {
        self.grants.contains(grant)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PermissionGrant> {
        self.grants.iter()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn has_permission(&self, actions: PermissionAction, scope: &PermissionScope) -> bool {
        self.grants.iter().any(|grant| grant.allows(actions, scope))
    }
}

impl Extend<PermissionGrant> for PermissionSet {
    fn extend<I: IntoIterator<Item = PermissionGrant>>(&mut self, iter: I) {
        for grant in iter {
            self.insert(grant);
        }
    }
}

impl FromIterator<PermissionGrant> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = PermissionGrant>>(iter: I) -> Self {
        let mut set = PermissionSet::new();
        set.extend(iter);
        set
    }
}

// Set equality: insertion order does not matter
impl PartialEq for PermissionSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.grants.iter().all(|grant| other.contains(grant))
    }
}

impl Eq for PermissionSet {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
    pub name: String,
    pub status: GroupStatus,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
}

impl Group {
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: GroupStatus::Active,
            permissions: Vec::new(),
        }
    }

    pub fn inactive(mut self) -> Self {
        self.status = GroupStatus::Inactive;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub name: String,
    pub status: AccountStatus,
    pub groups: BTreeMap<i64, Group>,
    pub permissions: PermissionSet,
}

impl Account {
    pub fn new(id: AccountId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: AccountStatus::Active,
            groups: BTreeMap::new(),
            permissions: PermissionSet::new(),
        }
    }

    /// The anonymous visitor: no groups, no grants
    pub fn guest() -> Self {
        Self::new(GUEST_ACCOUNT, "guest")
    }

    pub fn is_guest(&self) -> bool {
        !crate::types::is_authenticated(self.id)
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.groups.insert(group.id, group);
        self
    }

    pub fn group_ids(&self) -> Vec<i64> {
        self.groups.keys().copied().collect()
    }

    pub fn has_permission(&self, actions: PermissionAction, scope: &PermissionScope) -> bool {
        self.permissions.has_permission(actions, scope)
    }
}

/// Raw result of a grant lookup: storage may hand back a bare grant
#[derive(Debug, Clone, PartialEq)]
pub enum GrantFetch {
    Empty,
    One(PermissionGrant),
    Many(Vec<PermissionGrant>),
}

impl GrantFetch {
    pub fn into_vec(self) -> Vec<PermissionGrant> {
        match self {
            GrantFetch::Empty => Vec::new(),
            GrantFetch::One(grant) => vec![grant],
            GrantFetch::Many(grants) => grants,
        }
    }
}

impl From<Vec<PermissionGrant>> for GrantFetch {
    fn from(mut grants: Vec<PermissionGrant>) -> Self {
        match grants.len() {
            0 => GrantFetch::Empty,
            1 => GrantFetch::One(grants.remove(0)),
            _ => GrantFetch::Many(grants),
        }
    }
}

/// Account records with their group memberships (grants not populated)
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, id: AccountId) -> Result<Option<Account>, DatabaseError>;
}

/// Permission grant lookup by subject
#[async_trait]
pub trait GrantSource: Send + Sync {
    async fn get_for(&self, subject_ids: &[i64], kind: SubjectKind) -> Result<GrantFetch, DatabaseError>;
}
